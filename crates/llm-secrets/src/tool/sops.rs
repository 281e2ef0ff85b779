use std::io;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use llm_secrets_core::process::{probe, retry_exec_busy};
use tracing::debug;
use zeroize::Zeroizing;

use super::EncryptionTool;
use crate::error::{Result, SecretsError};

/// The store is always YAML, whatever the file is called
const FORMAT_ARGS: [&str; 4] = ["--input-type", "yaml", "--output-type", "yaml"];

/// `sops` + `age-keygen` subprocess driver.
#[derive(Debug, Clone)]
pub struct SopsTool {
    sops_binary: String,
    keygen_binary: String,
}

impl SopsTool {
    /// Constructs a driver using the binaries found on `PATH`.
    pub fn new() -> Self {
        Self::with_binaries("sops", "age-keygen")
    }

    /// Constructs a driver with custom binaries.
    pub fn with_binaries(sops_binary: impl Into<String>, keygen_binary: impl Into<String>) -> Self {
        Self {
            sops_binary: sops_binary.into(),
            keygen_binary: keygen_binary.into(),
        }
    }

    fn run(&self, binary: &str, command: &mut Command) -> Result<Output> {
        command.stdin(Stdio::null());
        retry_exec_busy(|| command.output()).map_err(|error| map_spawn_error(binary, error))
    }
}

impl Default for SopsTool {
    fn default() -> Self {
        Self::new()
    }
}

impl EncryptionTool for SopsTool {
    fn decrypt(&self, path: &Path) -> Result<Zeroizing<Vec<u8>>> {
        debug!(binary = %self.sops_binary, path = %path.display(), "decrypting");

        let mut command = Command::new(&self.sops_binary);
        command.arg("--decrypt").args(FORMAT_ARGS).arg(path);
        let output = self.run(&self.sops_binary, &mut command)?;

        if !output.status.success() {
            return Err(SecretsError::DecryptionFailed(stderr_of(&output)));
        }

        Ok(Zeroizing::new(output.stdout))
    }

    fn encrypt_in_place(&self, path: &Path) -> Result<()> {
        debug!(binary = %self.sops_binary, path = %path.display(), "encrypting in place");

        let mut command = Command::new(&self.sops_binary);
        command.args(["--encrypt", "--in-place"]).args(FORMAT_ARGS);
        // sops looks for .sops.yaml starting from its working directory
        match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
                command.current_dir(parent).arg(name);
            }
            _ => {
                command.arg(path);
            }
        }
        let output = self.run(&self.sops_binary, &mut command)?;

        if !output.status.success() {
            return Err(SecretsError::EncryptionFailed(stderr_of(&output)));
        }

        Ok(())
    }

    fn derive_recipient(&self, private_key: &Path) -> Result<String> {
        debug!(binary = %self.keygen_binary, key = %private_key.display(), "deriving recipient");

        let mut command = Command::new(&self.keygen_binary);
        command.arg("-y").arg(private_key);
        let output = self.run(&self.keygen_binary, &mut command)?;

        if !output.status.success() {
            return Err(SecretsError::RecipientDerivationFailed(stderr_of(&output)));
        }

        // One recipient per identity in the key file
        let stdout = String::from_utf8_lossy(&output.stdout);
        let recipients: Vec<&str> = stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        if recipients.is_empty() {
            return Err(SecretsError::RecipientDerivationFailed(format!(
                "{} printed no recipient for {}",
                self.keygen_binary,
                private_key.display()
            )));
        }

        Ok(recipients.join(","))
    }

    fn check_available(&self, tool: &str) -> bool {
        probe(tool)
    }
}

fn stderr_of(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}

fn map_spawn_error(binary: &str, error: io::Error) -> SecretsError {
    if error.kind() == io::ErrorKind::NotFound {
        return SecretsError::ToolNotAvailable(binary.to_owned());
    }
    SecretsError::Spawn {
        program: binary.to_owned(),
        source: error,
    }
}
