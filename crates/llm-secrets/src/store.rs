//! Store - read and atomically rewrite the encrypted secrets file
//!
//! Every mutation is a full read-modify-write of one file. New content is
//! written to a hidden temporary sibling, encrypted there, and renamed over
//! the canonical path, so the canonical path only ever holds complete
//! encrypted content. No locking: concurrent writers race and the last
//! rename wins.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::codec::{self, SecretMap};
use crate::error::{Result, SecretsError};
use crate::tool::EncryptionTool;

/// Suffix of the temporary sibling used during writes
pub const TEMP_SUFFIX: &str = ".tmp";

/// The encrypted secrets file and the tool that opens it
pub struct Store<T: EncryptionTool> {
    path: PathBuf,
    tool: T,
}

impl<T: EncryptionTool> Store<T> {
    pub fn new(path: impl Into<PathBuf>, tool: T) -> Self {
        Self {
            path: path.into(),
            tool,
        }
    }

    /// Canonical path of the encrypted file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Decrypt and parse the whole store
    pub fn read_all(&self) -> Result<SecretMap> {
        if !self.exists() {
            return Err(SecretsError::StoreNotFound(self.path.clone()));
        }

        let plaintext = self.tool.decrypt(&self.path)?;
        let text = std::str::from_utf8(&plaintext).map_err(|_| {
            SecretsError::Codec("decrypted content is not valid UTF-8".to_string())
        })?;

        codec::deserialize(text)
    }

    /// Replace the store with `secrets`, atomically.
    ///
    /// The temporary file never outlives this call, whichever step fails.
    pub fn write_all(&self, secrets: &SecretMap) -> Result<()> {
        let text = Zeroizing::new(codec::serialize(secrets)?);

        let dir = parent_dir(&self.path);
        fs::create_dir_all(dir)?;

        let mut temp = Builder::new()
            .prefix(&temp_prefix(&self.path))
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)?;

        if let Err(e) = self.seal(&mut temp, text.as_bytes()) {
            discard(temp);
            return Err(e);
        }

        match temp.persist(&self.path) {
            Ok(_) => {
                debug!(path = %self.path.display(), keys = secrets.len(), "store written");
                Ok(())
            }
            Err(e) => {
                discard(e.file);
                Err(SecretsError::Io(e.error))
            }
        }
    }

    /// Write plaintext into the temporary file and encrypt it there
    fn seal(&self, temp: &mut NamedTempFile, plaintext: &[u8]) -> Result<()> {
        temp.write_all(plaintext)?;
        temp.as_file().sync_all()?;
        self.tool.encrypt_in_place(temp.path())
    }
}

/// Remove a temporary file, reporting rather than propagating failure
fn discard(temp: NamedTempFile) {
    let path = temp.path().to_path_buf();
    if let Err(e) = temp.close() {
        warn!(path = %path.display(), error = %e, "failed to remove temporary secrets file");
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// `.secrets.yaml.` for `secrets.yaml`, so temp files are hidden and easy to spot
fn temp_prefix(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "secrets".to_string());
    format!(".{name}.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{FakeTool, ToolCall};
    use tempfile::tempdir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn sample() -> SecretMap {
        let mut secrets = SecretMap::new();
        secrets.insert("api_key".to_string(), "sk-1234567890abcdef".to_string());
        secrets.insert("cert".to_string(), "line one\n  line two\n".to_string());
        secrets
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().join("secrets.yaml"), FakeTool::new());

        store.write_all(&sample()).unwrap();

        assert!(FakeTool::is_encrypted(store.path()));
        assert_eq!(store.read_all().unwrap(), sample());
        assert_eq!(entries(dir.path()), vec!["secrets.yaml"]);
    }

    #[test]
    fn test_read_missing_store() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().join("secrets.yaml"), FakeTool::new());

        let err = store.read_all().unwrap_err();
        assert!(matches!(err, SecretsError::StoreNotFound(_)));
        assert!(store.tool().calls().is_empty());
    }

    #[test]
    fn test_read_empty_plaintext() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().join("secrets.yaml"), FakeTool::new());
        fs::write(store.path(), "").unwrap();
        store.tool().encrypt_in_place(store.path()).unwrap();

        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_encryption_failure_leaves_store_and_no_temp() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().join("secrets.yaml"), FakeTool::new());
        store.write_all(&sample()).unwrap();
        let before = fs::read(store.path()).unwrap();

        store.tool().set_fail_encrypt(true);
        let mut changed = sample();
        changed.insert("new".to_string(), "value".to_string());
        let err = store.write_all(&changed).unwrap_err();

        assert!(matches!(err, SecretsError::EncryptionFailed(_)));
        assert_eq!(fs::read(store.path()).unwrap(), before);
        assert_eq!(entries(dir.path()), vec!["secrets.yaml"]);
    }

    #[test]
    fn test_rename_failure_removes_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secrets.yaml");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), "x").unwrap();
        let store = Store::new(&path, FakeTool::new());

        let err = store.write_all(&sample()).unwrap_err();

        assert!(matches!(err, SecretsError::Io(_)));
        assert!(path.is_dir());
        assert_eq!(entries(dir.path()), vec!["secrets.yaml"]);
    }

    #[test]
    fn test_encrypts_hidden_sibling() {
        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().join("secrets.yaml"), FakeTool::new());
        store.write_all(&sample()).unwrap();

        let calls = store.tool().calls();
        let ToolCall::Encrypt(temp) = &calls[0] else {
            panic!("expected an encrypt call, got {:?}", calls);
        };
        assert_eq!(temp.parent(), Some(dir.path()));
        let name = temp.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with(".secrets.yaml."));
        assert!(name.ends_with(TEMP_SUFFIX));
        assert!(!temp.exists());
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/secrets.yaml");
        let store = Store::new(&path, FakeTool::new());

        store.write_all(&sample()).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_store_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = Store::new(dir.path().join("secrets.yaml"), FakeTool::new());
        store.write_all(&sample()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
