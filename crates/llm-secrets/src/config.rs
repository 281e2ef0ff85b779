//! Resolved configuration handed to the vault.
//!
//! Built once at startup; nothing below `main` looks at the environment.

use std::path::PathBuf;

use llm_secrets_core::Paths;

/// File locations the vault operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Encrypted secrets file
    pub secrets_file: PathBuf,
    /// age private key, used only to derive a recipient at init time
    pub age_key_file: PathBuf,
}

impl Config {
    pub fn new(secrets_file: impl Into<PathBuf>, age_key_file: impl Into<PathBuf>) -> Self {
        Self {
            secrets_file: secrets_file.into(),
            age_key_file: age_key_file.into(),
        }
    }

    /// Configuration from resolved standard paths
    pub fn from_paths(paths: &Paths) -> Self {
        Self::new(&paths.secrets_file, &paths.age_key_file)
    }

    /// Use a different secrets file (the `--file` flag)
    pub fn with_secrets_file(mut self, secrets_file: impl Into<PathBuf>) -> Self {
        self.secrets_file = secrets_file.into();
        self
    }

    /// `.sops.yaml` next to the secrets file
    pub fn sops_config(&self) -> PathBuf {
        Paths::sops_config_for(&self.secrets_file)
    }
}
