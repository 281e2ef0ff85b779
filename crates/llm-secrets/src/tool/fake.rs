use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use zeroize::Zeroizing;

use super::EncryptionTool;
use crate::error::{Result, SecretsError};

/// Marker line the fake puts in front of "encrypted" files
const HEADER: &[u8] = b"# fake-sops encrypted\n";

/// One recorded invocation of a [`FakeTool`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Decrypt(PathBuf),
    Encrypt(PathBuf),
    DeriveRecipient(PathBuf),
    CheckAvailable(String),
}

/// In-process stand-in for sops/age-keygen.
///
/// "Encryption" prepends a header line and "decryption" strips it, so bytes
/// on disk still differ from the plaintext and a plaintext file fails to
/// decrypt. Failures can be switched on at any time to exercise error paths.
#[derive(Debug, Default)]
pub struct FakeTool {
    recipient: Option<String>,
    available: HashSet<String>,
    fail_encrypt: AtomicBool,
    fail_decrypt: AtomicBool,
    calls: Mutex<Vec<ToolCall>>,
}

impl FakeTool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recipient returned by `derive_recipient`; without one, derivation fails.
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Tool names `check_available` reports as installed.
    pub fn with_available(mut self, tools: &[&str]) -> Self {
        self.available = tools.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn set_fail_encrypt(&self, fail: bool) {
        self.fail_encrypt.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_decrypt(&self, fail: bool) {
        self.fail_decrypt.store(fail, Ordering::SeqCst);
    }

    /// Everything invoked so far, oldest first.
    pub fn calls(&self) -> Vec<ToolCall> {
        self.lock_calls().clone()
    }

    /// Whether `path` holds bytes produced by this fake's encryption.
    pub fn is_encrypted(path: &Path) -> bool {
        fs::read(path)
            .map(|bytes| bytes.starts_with(HEADER))
            .unwrap_or(false)
    }

    fn record(&self, call: ToolCall) {
        self.lock_calls().push(call);
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<ToolCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EncryptionTool for FakeTool {
    fn decrypt(&self, path: &Path) -> Result<Zeroizing<Vec<u8>>> {
        self.record(ToolCall::Decrypt(path.to_path_buf()));

        if self.fail_decrypt.load(Ordering::SeqCst) {
            return Err(SecretsError::DecryptionFailed(
                "fake: no identity could decrypt the data key".to_string(),
            ));
        }

        let bytes = Zeroizing::new(fs::read(path)?);
        match bytes.strip_prefix(HEADER) {
            Some(plain) => Ok(Zeroizing::new(plain.to_vec())),
            None => Err(SecretsError::DecryptionFailed(
                "fake: sops metadata not found".to_string(),
            )),
        }
    }

    fn encrypt_in_place(&self, path: &Path) -> Result<()> {
        self.record(ToolCall::Encrypt(path.to_path_buf()));

        if self.fail_encrypt.load(Ordering::SeqCst) {
            return Err(SecretsError::EncryptionFailed(
                "fake: no matching creation rules found".to_string(),
            ));
        }

        let plain = Zeroizing::new(fs::read(path)?);
        if plain.starts_with(HEADER) {
            return Err(SecretsError::EncryptionFailed(
                "fake: file already encrypted".to_string(),
            ));
        }

        let mut sealed = Zeroizing::new(Vec::with_capacity(HEADER.len() + plain.len()));
        sealed.extend_from_slice(HEADER);
        sealed.extend_from_slice(&plain);
        fs::write(path, &*sealed)?;
        Ok(())
    }

    fn derive_recipient(&self, private_key: &Path) -> Result<String> {
        self.record(ToolCall::DeriveRecipient(private_key.to_path_buf()));

        self.recipient.clone().ok_or_else(|| {
            SecretsError::RecipientDerivationFailed(format!(
                "fake: no identity in {}",
                private_key.display()
            ))
        })
    }

    fn check_available(&self, tool: &str) -> bool {
        self.record(ToolCall::CheckAvailable(tool.to_string()));
        self.available.contains(tool)
    }
}
