//! Vault - Lifecycle operations on the encrypted secrets file
//!
//! All secrets live in one sops-encrypted YAML file. Reads decrypt the
//! whole file; writes go through [`Store::write_all`]. Keys starting with
//! `_` are internal placeholders (the initial `_example` entry).

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::codec::SecretMap;
use crate::config::Config;
use crate::error::{Result, SecretsError};
use crate::mask::mask;
use crate::store::Store;
use crate::tool::EncryptionTool;

/// Prefix marking internal/placeholder keys
pub const INTERNAL_PREFIX: char = '_';

/// Entry written by `init` so a fresh store is never empty
pub const PLACEHOLDER_KEY: &str = "_example";
pub const PLACEHOLDER_VALUE: &str = "replace-me";

/// A stored secret (key only, value is decrypted on demand)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    /// The key name (e.g., "openai_api_key")
    pub key: String,
}

impl Secret {
    /// Internal entries are listed separately from real secrets
    pub fn is_internal(&self) -> bool {
        self.key.starts_with(INTERNAL_PREFIX)
    }
}

/// Options for [`Vault::init`]
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// age recipient to encrypt for; derived from the age key file if absent
    pub recipient: Option<String>,
    /// Replace an existing store instead of failing
    pub force: bool,
}

/// One `ENV_VAR=secret_key` injection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvBinding {
    pub env_var: String,
    pub key: String,
}

impl FromStr for EnvBinding {
    type Err = SecretsError;

    fn from_str(s: &str) -> Result<Self> {
        let (env_var, key) = s.split_once('=').ok_or_else(|| {
            SecretsError::InvalidInput(format!("invalid inject format: {s} (use ENV_VAR=secret_key)"))
        })?;

        if env_var.is_empty() {
            return Err(SecretsError::InvalidInput(format!(
                "missing environment variable name in: {s}"
            )));
        }
        if key.is_empty() {
            return Err(SecretsError::InvalidInput(format!(
                "missing secret key in: {s}"
            )));
        }

        Ok(Self {
            env_var: env_var.to_string(),
            key: key.to_string(),
        })
    }
}

/// Installation and store health, as shown by `llm-secrets status`
#[derive(Debug, Clone)]
pub struct Status {
    pub sops_installed: bool,
    pub age_installed: bool,
    pub secrets_file: PathBuf,
    pub secrets_file_exists: bool,
    pub age_key_file: PathBuf,
    pub age_key_file_exists: bool,
    /// Number of keys, or why the store could not be read. `None` without a store.
    pub key_count: Option<std::result::Result<usize, String>>,
}

/// `.sops.yaml` as written at init time
#[derive(Serialize)]
struct SopsConfig {
    creation_rules: Vec<CreationRule>,
}

#[derive(Serialize)]
struct CreationRule {
    age: String,
}

/// The secrets vault
pub struct Vault<T: EncryptionTool> {
    store: Store<T>,
    config: Config,
}

impl<T: EncryptionTool> Vault<T> {
    /// Create a vault over the configured secrets file
    pub fn new(config: Config, tool: T) -> Self {
        Self {
            store: Store::new(config.secrets_file.clone(), tool),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Store<T> {
        &self.store
    }

    pub fn tool(&self) -> &T {
        self.store.tool()
    }

    /// Create the secrets file with a placeholder entry.
    ///
    /// Returns the recipient the store was encrypted for.
    pub fn init(&self, options: InitOptions) -> Result<String> {
        let path = self.store.path();
        if self.store.exists() && !options.force {
            return Err(SecretsError::StoreAlreadyExists(path.to_path_buf()));
        }

        let recipient = self.resolve_recipient(options.recipient)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.write_sops_config(&recipient)?;

        let mut initial = SecretMap::new();
        initial.insert(PLACEHOLDER_KEY.to_string(), PLACEHOLDER_VALUE.to_string());
        self.store.write_all(&initial)?;

        debug!(path = %path.display(), "initialized secrets file");
        Ok(recipient)
    }

    fn resolve_recipient(&self, supplied: Option<String>) -> Result<String> {
        if let Some(recipient) = supplied {
            let recipient = recipient.trim();
            if !recipient.is_empty() {
                return Ok(recipient.to_string());
            }
        }

        let key_file = &self.config.age_key_file;
        if !key_file.exists() {
            return Err(SecretsError::NoRecipientAvailable(key_file.clone()));
        }

        // A key file that age-keygen rejects is reported as is
        self.tool().derive_recipient(key_file).map_err(|e| {
            warn!(key = %key_file.display(), error = %e, "could not derive age recipient");
            e
        })
    }

    /// Write `.sops.yaml` next to the store unless one is already there
    fn write_sops_config(&self, recipient: &str) -> Result<()> {
        let path = self.config.sops_config();
        let config = SopsConfig {
            creation_rules: vec![CreationRule {
                age: recipient.to_string(),
            }],
        };
        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| SecretsError::Codec(e.to_string()))?;

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(yaml.as_bytes())?;
                debug!(path = %path.display(), "wrote sops creation rules");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %path.display(), "keeping existing sops config");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// List all keys, sorted. Values are never returned.
    pub fn list(&self) -> Result<Vec<Secret>> {
        let secrets = self.store.read_all()?;
        Ok(secrets.into_keys().map(|key| Secret { key }).collect())
    }

    /// Retrieve a raw secret value. Not for output an LLM can read.
    pub fn get(&self, key: &str) -> Result<String> {
        let mut secrets = self.store.read_all()?;
        secrets
            .remove(key)
            .ok_or_else(|| SecretsError::KeyNotFound(key.to_string()))
    }

    /// Retrieve a masked secret value, safe to display
    pub fn peek(&self, key: &str, visible_chars: usize) -> Result<String> {
        let value = Zeroizing::new(self.get(key)?);
        Ok(mask(&value, visible_chars))
    }

    /// Store a secret, creating the file if needed. Existing values are
    /// overwritten.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        if key.is_empty() {
            return Err(SecretsError::InvalidInput("key cannot be empty".to_string()));
        }

        let mut secrets = if self.store.exists() {
            self.store.read_all()?
        } else {
            SecretMap::new()
        };

        secrets.insert(key.to_string(), value.to_string());
        self.store.write_all(&secrets)?;

        debug!(key, "secret stored");
        Ok(())
    }

    /// Delete a secret
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut secrets = self.store.read_all()?;
        if secrets.remove(key).is_none() {
            return Err(SecretsError::KeyNotFound(key.to_string()));
        }

        self.store.write_all(&secrets)?;

        debug!(key, "secret deleted");
        Ok(())
    }

    /// Run `command` with secrets bound to environment variables and return
    /// its exit code.
    ///
    /// Every binding is resolved before anything is started. The child
    /// inherits stdio and a copy of this process's environment plus the
    /// bindings; this process's environment is left alone.
    pub fn inject_and_run(&self, bindings: &[EnvBinding], command: &[String]) -> Result<i32> {
        if command.is_empty() {
            return Err(no_command());
        }
        self.resolve(bindings)?.run(command)
    }

    /// Look up every binding with a single decryption.
    ///
    /// Fails on the first missing key. With no bindings the store is not read.
    pub fn resolve(&self, bindings: &[EnvBinding]) -> Result<Injection> {
        let mut vars = Vec::with_capacity(bindings.len());
        if !bindings.is_empty() {
            let secrets = self.store.read_all()?;
            for binding in bindings {
                let value = secrets
                    .get(&binding.key)
                    .ok_or_else(|| SecretsError::KeyNotFound(binding.key.clone()))?;
                vars.push((binding.clone(), Zeroizing::new(value.clone())));
            }
        }
        Ok(Injection { vars })
    }

    /// Report tool availability and store health. Never fails.
    pub fn status(&self) -> Status {
        let secrets_file_exists = self.store.exists();
        let key_count = secrets_file_exists.then(|| {
            self.store
                .read_all()
                .map(|secrets| secrets.len())
                .map_err(|e| e.to_string())
        });

        Status {
            sops_installed: self.tool().check_available("sops"),
            age_installed: self.tool().check_available("age"),
            secrets_file: self.config.secrets_file.clone(),
            secrets_file_exists,
            age_key_file: self.config.age_key_file.clone(),
            age_key_file_exists: self.config.age_key_file.exists(),
            key_count,
        }
    }
}

/// Bindings whose values have been looked up, ready to hand to a child
pub struct Injection {
    vars: Vec<(EnvBinding, Zeroizing<String>)>,
}

impl Injection {
    /// The bindings that will be set, in the order given
    pub fn bindings(&self) -> impl Iterator<Item = &EnvBinding> {
        self.vars.iter().map(|(binding, _)| binding)
    }

    /// Run `command` with the resolved values added to a copy of this
    /// process's environment; returns the exit code
    pub fn run(&self, command: &[String]) -> Result<i32> {
        let (program, args) = command.split_first().ok_or_else(no_command)?;

        let mut child = Command::new(program);
        child.args(args);
        for (binding, value) in &self.vars {
            child.env(binding.env_var.as_str(), value.as_str());
        }

        debug!(program = %program, injected = self.vars.len(), "running command");
        let status = child.status().map_err(|source| SecretsError::Spawn {
            program: program.clone(),
            source,
        })?;

        Ok(exit_code(status))
    }
}

fn no_command() -> SecretsError {
    SecretsError::InvalidInput("no command specified".to_string())
}

/// Exit code as a shell would report it: 128 + signal for a killed child
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
