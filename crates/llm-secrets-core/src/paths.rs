//! Standard paths used by llm-secrets

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable overriding the secrets file location
pub const SECRETS_FILE_ENV: &str = "LLM_SECRETS_FILE";
/// Environment variable overriding the age private key location (shared with sops)
pub const AGE_KEY_FILE_ENV: &str = "SOPS_AGE_KEY_FILE";
/// XDG base directory for configuration
pub const XDG_CONFIG_HOME_ENV: &str = "XDG_CONFIG_HOME";

const APP_DIR: &str = "llm-secrets";
const SECRETS_FILE_NAME: &str = "secrets.yaml";

/// Resolved llm-secrets paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// Config directory ($XDG_CONFIG_HOME/llm-secrets or ~/.config/llm-secrets)
    pub config: PathBuf,
    /// Encrypted secrets file
    pub secrets_file: PathBuf,
    /// age private key used to derive the recipient at init time
    pub age_key_file: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    /// Resolve paths from the process environment
    pub fn new() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
        Self::resolve(|name| std::env::var_os(name), &home)
    }

    /// Resolve paths from an arbitrary environment lookup and home directory.
    ///
    /// Existence checks for the fallback locations go to the real filesystem.
    pub fn resolve<F>(env: F, home: &Path) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let config = match non_empty(env(XDG_CONFIG_HOME_ENV)) {
            Some(xdg) => PathBuf::from(xdg).join(APP_DIR),
            None => home.join(".config").join(APP_DIR),
        };

        let secrets_file = match non_empty(env(SECRETS_FILE_ENV)) {
            Some(value) => expand_home(&value, home),
            None => {
                let preferred = config.join(SECRETS_FILE_NAME);
                // ~/.claude/secrets.yaml predates the XDG location
                let legacy = home.join(".claude").join(SECRETS_FILE_NAME);
                if !preferred.exists() && legacy.exists() {
                    legacy
                } else {
                    preferred
                }
            }
        };

        let age_key_file = match non_empty(env(AGE_KEY_FILE_ENV)) {
            Some(value) => expand_home(&value, home),
            None => {
                let candidates = [
                    home.join(".config/sops/age/keys.txt"),
                    home.join(".sops/age/keys.txt"),
                ];
                candidates
                    .iter()
                    .find(|path| path.exists())
                    .unwrap_or(&candidates[0])
                    .clone()
            }
        };

        Self {
            config,
            secrets_file,
            age_key_file,
        }
    }

    /// Recipient configuration file read by sops, next to a secrets file
    pub fn sops_config_for(secrets_file: &Path) -> PathBuf {
        secrets_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(".sops.yaml")
    }
}

fn non_empty(value: Option<OsString>) -> Option<OsString> {
    value.filter(|v| !v.is_empty())
}

/// Expand a leading `~` against the given home directory
fn expand_home(value: &OsString, home: &Path) -> PathBuf {
    let raw = value.to_string_lossy();
    let home = home.to_string_lossy();
    let expanded = shellexpand::tilde_with_context(raw.as_ref(), || Some(home.as_ref()));
    PathBuf::from(expanded.as_ref())
}
