//! llm-secrets - sops wrapper for the AI agent era
//!
//! Manage encrypted secrets without leaking them into LLM context.
//!
//! Commands:
//! - status: Check sops/age installation and the secrets file
//! - init: Create the secrets file and its .sops.yaml
//! - list: List secret keys (safe for LLM)
//! - peek <KEY>: Show a masked value (safe for LLM)
//! - get <KEY>: Print the raw value (scripts only)
//! - set <KEY>: Store a secret via hidden input
//! - delete <KEY>: Delete a secret
//! - exec --inject ENV=KEY -- <CMD>: Run a command with secrets injected

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use llm_secrets::mask::DEFAULT_VISIBLE_CHARS;
use llm_secrets::{
    mask, Config, EncryptionTool, EnvBinding, InitOptions, SecretsError, SopsTool, Vault,
};
use llm_secrets_core::Paths;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "llm-secrets")]
#[command(about = "sops wrapper for the AI agent era - manage secrets without leaking them to LLM context")]
#[command(version)]
#[command(after_help = r#"EXAMPLES:
    llm-secrets status                    # Check setup
    llm-secrets init                      # Initialize secrets file
    llm-secrets list                      # List keys (safe for LLM)
    llm-secrets peek api_key              # View masked secret (safe)
    llm-secrets set api_key               # Set via hidden input
    llm-secrets exec --inject API_KEY=api_key -- ./script.sh

LLM SAFETY:
    - 'list' and 'peek' are safe to use with LLMs
    - 'get' outputs the full secret - use only in scripts
    - 'set' uses hidden input - never in shell history
    - 'exec' injects secrets without exposing them

ENVIRONMENT:
    LLM_SECRETS_FILE    Override default secrets file
    SOPS_AGE_KEY_FILE   Override age key location
    RUST_LOG            Diagnostic logging (stderr), e.g. RUST_LOG=debug"#)]
struct Cli {
    /// Secrets file (default: ~/.config/llm-secrets/secrets.yaml)
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show status and configuration
    Status,

    /// Initialize the secrets file
    Init {
        /// age public key to encrypt for (derived from the age key file if omitted)
        #[arg(long)]
        age_recipient: Option<String>,
        /// Replace an existing secrets file
        #[arg(long)]
        force: bool,
    },

    /// List secret keys (safe for LLM)
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// View a masked secret (safe for LLM)
    Peek {
        /// Secret key
        key: String,
        /// Characters to show at each end
        #[arg(short, long, default_value_t = DEFAULT_VISIBLE_CHARS)]
        chars: usize,
    },

    /// Print the full secret (UNSAFE - scripts only)
    Get {
        /// Secret key
        key: String,
    },

    /// Store a secret (prompts with hidden input by default)
    Set {
        /// Secret key
        key: String,
        /// Value (NOT recommended - visible in shell history)
        #[arg(long, conflicts_with = "from_file")]
        value: Option<String>,
        /// Read the value from a file
        #[arg(long)]
        from_file: Option<PathBuf>,
        /// Delete the source file after reading
        #[arg(long, requires = "from_file")]
        delete_file: bool,
    },

    /// Delete a secret
    Delete {
        /// Secret key
        key: String,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },

    /// Run a command with secrets injected as environment variables
    Exec {
        /// Inject a secret as an env var (repeatable)
        #[arg(long = "inject", value_name = "ENV=KEY")]
        inject: Vec<EnvBinding>,
        /// Command to run
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
}

fn main() -> Result<()> {
    // Diagnostics go to stderr so `get` output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_paths(&Paths::new());
    if let Some(file) = cli.file {
        config = config.with_secrets_file(file);
    }
    let vault = Vault::new(config, SopsTool::new());

    match cli.command {
        Some(Commands::Status) => cmd_status(&vault),
        Some(Commands::Init {
            age_recipient,
            force,
        }) => cmd_init(&vault, age_recipient, force),
        Some(Commands::List { json }) => cmd_list(&vault, json),
        Some(Commands::Peek { key, chars }) => cmd_peek(&vault, &key, chars),
        Some(Commands::Get { key }) => cmd_get(&vault, &key),
        Some(Commands::Set {
            key,
            value,
            from_file,
            delete_file,
        }) => cmd_set(&vault, &key, value, from_file, delete_file),
        Some(Commands::Delete { key, force }) => cmd_delete(&vault, &key, force),
        Some(Commands::Exec { inject, command }) => {
            let code = cmd_exec(&vault, &inject, &command)?;
            std::process::exit(code);
        }
        None => cmd_status(&vault),
    }
}

/// Show tool installation and secrets file status
fn cmd_status(vault: &Vault<SopsTool>) -> Result<()> {
    let status = vault.status();

    println!("llm-secrets status");
    println!();
    println!("  {:<14} {:<12} {}", "COMPONENT", "STATUS", "PATH/INFO");
    println!(
        "  {:<14} {:<12} {}",
        "sops",
        installed(status.sops_installed),
        if status.sops_installed { "" } else { "brew install sops" }
    );
    println!(
        "  {:<14} {:<12} {}",
        "age",
        installed(status.age_installed),
        if status.age_installed { "" } else { "brew install age" }
    );
    println!(
        "  {:<14} {:<12} {}",
        "secrets file",
        exists(status.secrets_file_exists),
        status.secrets_file.display()
    );
    println!(
        "  {:<14} {:<12} {}",
        "age key",
        exists(status.age_key_file_exists),
        status.age_key_file.display()
    );

    match status.key_count {
        Some(Ok(count)) => println!("\nSecrets: {} keys", count),
        Some(Err(e)) => println!("\nerror: Cannot read secrets: {}", e),
        None => {}
    }

    Ok(())
}

fn installed(ok: bool) -> &'static str {
    if ok {
        "installed"
    } else {
        "not found"
    }
}

fn exists(ok: bool) -> &'static str {
    if ok {
        "exists"
    } else {
        "not found"
    }
}

/// Initialize the secrets file
fn cmd_init(vault: &Vault<SopsTool>, age_recipient: Option<String>, force: bool) -> Result<()> {
    let path = vault.config().secrets_file.clone();

    match vault.init(InitOptions {
        recipient: age_recipient,
        force,
    }) {
        Ok(recipient) => {
            println!("success: Initialized: {}", path.display());
            println!("Encrypting for: {}", recipient);
            println!();
            println!("Add secrets with: llm-secrets set <key>");
            Ok(())
        }
        Err(SecretsError::StoreAlreadyExists(_)) => {
            bail!(
                "File already exists: {} (use --force to reinitialize)",
                path.display()
            )
        }
        Err(e) => Err(e.into()),
    }
}

/// List secret keys; values are never shown
fn cmd_list(vault: &Vault<SopsTool>, json: bool) -> Result<()> {
    let secrets = vault.list()?;

    if json {
        let entries: Vec<serde_json::Value> = secrets
            .iter()
            .map(|s| serde_json::json!({ "key": s.key, "internal": s.is_internal() }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if secrets.is_empty() {
        println!("No secrets found. Add one with: llm-secrets set <key>");
        return Ok(());
    }

    println!("Available Secrets");
    println!();
    for secret in &secrets {
        let state = if secret.is_internal() {
            "internal"
        } else {
            "available"
        };
        println!("  {:<32} {}", secret.key, state);
    }
    println!();
    println!("Total: {} secrets", secrets.len());
    println!("Use 'llm-secrets peek <key>' to view a masked value");

    Ok(())
}

/// Show a masked secret
fn cmd_peek(vault: &Vault<SopsTool>, key: &str, chars: usize) -> Result<()> {
    let masked = vault.peek(key, chars)?;
    println!("{}: {}", key, masked);
    Ok(())
}

/// Print the raw value with no trailing newline, for piping
fn cmd_get(vault: &Vault<SopsTool>, key: &str) -> Result<()> {
    let value = vault.get(key)?;
    let mut stdout = io::stdout().lock();
    stdout.write_all(value.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Store a secret. A `--delete-file` source is removed only once stored.
fn cmd_set<T: EncryptionTool>(
    vault: &Vault<T>,
    key: &str,
    value: Option<String>,
    from_file: Option<PathBuf>,
    delete_file: bool,
) -> Result<()> {
    let mut source = None;
    let secret_value = match (value, from_file) {
        (Some(v), _) => {
            eprintln!("warning: Value visible in shell history");
            v
        }
        (None, Some(file)) => {
            let file = expand_tilde(&file);
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            source = Some(file);
            contents.trim().to_string()
        }
        (None, None) => prompt_value(key)?,
    };

    if secret_value.is_empty() {
        return Err(SecretsError::InvalidInput("Empty value not allowed".to_string()).into());
    }

    vault.set(key, &secret_value)?;

    println!(
        "success: Set: {} = {}",
        key,
        mask(&secret_value, DEFAULT_VISIBLE_CHARS)
    );

    if let Some(file) = source.filter(|_| delete_file) {
        fs::remove_file(&file).with_context(|| format!("Failed to delete {}", file.display()))?;
        println!("Deleted source file: {}", file.display());
    }

    Ok(())
}

fn expand_tilde(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Prompt twice with hidden input
fn prompt_value(key: &str) -> Result<String> {
    println!("Setting secret: {}", key);

    let value =
        rpassword::prompt_password("Enter value (hidden): ").context("Failed to read secret value")?;
    if value.is_empty() {
        return Err(SecretsError::InvalidInput("Empty value not allowed".to_string()).into());
    }

    let confirm = rpassword::prompt_password("Confirm value (hidden): ")
        .context("Failed to read confirmation")?;
    if value != confirm {
        return Err(SecretsError::InvalidInput("Values don't match".to_string()).into());
    }

    Ok(value)
}

/// Delete a secret, confirming first unless forced
fn cmd_delete(vault: &Vault<SopsTool>, key: &str, force: bool) -> Result<()> {
    if !force {
        let masked = vault.peek(key, DEFAULT_VISIBLE_CHARS)?;
        println!("Delete: {} = {}", key, masked);
        print!("Type 'yes' to confirm: ");
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin()
            .read_line(&mut answer)
            .context("Failed to read confirmation")?;
        if !answer.trim().eq_ignore_ascii_case("yes") {
            println!("Cancelled");
            return Ok(());
        }
    }

    vault.delete(key)?;
    println!("success: Deleted: {}", key);
    Ok(())
}

/// Run a command with secrets injected; returns the child's exit code
fn cmd_exec(vault: &Vault<SopsTool>, inject: &[EnvBinding], command: &[String]) -> Result<i32> {
    let injection = vault.resolve(inject)?;
    for binding in injection.bindings() {
        eprintln!("Injected: {} (from {})", binding.env_var, binding.key);
    }

    injection
        .run(command)
        .context("Failed to run command with injected secrets")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["llm-secrets", "list"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::List { json: false })));

        let cli = Cli::try_parse_from(["llm-secrets", "-f", "/tmp/s.yaml", "get", "api_key"]).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("/tmp/s.yaml")));
        if let Some(Commands::Get { key }) = cli.command {
            assert_eq!(key, "api_key");
        } else {
            panic!("Expected Get command");
        }

        // --file is global
        let cli = Cli::try_parse_from(["llm-secrets", "list", "--file", "/tmp/s.yaml"]).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("/tmp/s.yaml")));
    }

    #[test]
    fn test_cli_peek_chars() {
        let cli = Cli::try_parse_from(["llm-secrets", "peek", "api_key"]).unwrap();
        if let Some(Commands::Peek { key, chars }) = cli.command {
            assert_eq!(key, "api_key");
            assert_eq!(chars, 4);
        } else {
            panic!("Expected Peek command");
        }

        let cli = Cli::try_parse_from(["llm-secrets", "peek", "api_key", "-c", "2"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Peek { chars: 2, .. })));
    }

    #[test]
    fn test_cli_set() {
        let cli = Cli::try_parse_from(["llm-secrets", "set", "api_key"]).unwrap();
        if let Some(Commands::Set {
            key,
            value,
            from_file,
            delete_file,
        }) = cli.command
        {
            assert_eq!(key, "api_key");
            assert!(value.is_none());
            assert!(from_file.is_none());
            assert!(!delete_file);
        } else {
            panic!("Expected Set command");
        }

        assert!(Cli::try_parse_from(["llm-secrets", "set", "k", "--delete-file"]).is_err());
        assert!(Cli::try_parse_from([
            "llm-secrets",
            "set",
            "k",
            "--value",
            "v",
            "--from-file",
            "f"
        ])
        .is_err());
    }

    #[test]
    fn test_cli_init() {
        let cli = Cli::try_parse_from(["llm-secrets", "init", "--age-recipient", "age1abc", "--force"])
            .unwrap();
        if let Some(Commands::Init {
            age_recipient,
            force,
        }) = cli.command
        {
            assert_eq!(age_recipient.as_deref(), Some("age1abc"));
            assert!(force);
        } else {
            panic!("Expected Init command");
        }
    }

    #[test]
    fn test_cli_exec() {
        let cli = Cli::try_parse_from([
            "llm-secrets",
            "exec",
            "--inject",
            "API_KEY=api_key",
            "--inject",
            "DB=db_password",
            "--",
            "curl",
            "-H",
            "x",
        ])
        .unwrap();
        if let Some(Commands::Exec { inject, command }) = cli.command {
            assert_eq!(inject.len(), 2);
            assert_eq!(inject[0].env_var, "API_KEY");
            assert_eq!(inject[1].key, "db_password");
            assert_eq!(command, vec!["curl", "-H", "x"]);
        } else {
            panic!("Expected Exec command");
        }
    }

    #[test]
    fn test_set_from_file_keeps_source_until_stored() {
        use llm_secrets::FakeTool;

        let tmp = tempfile::tempdir().unwrap();
        let vault = Vault::new(
            Config::new(tmp.path().join("secrets.yaml"), tmp.path().join("keys.txt")),
            FakeTool::new(),
        );
        let source = tmp.path().join("token.txt");
        fs::write(&source, "sk-from-file\n").unwrap();

        vault.tool().set_fail_encrypt(true);
        assert!(cmd_set(&vault, "token", None, Some(source.clone()), true).is_err());
        assert!(source.exists());

        vault.tool().set_fail_encrypt(false);
        cmd_set(&vault, "token", None, Some(source.clone()), true).unwrap();
        assert!(!source.exists());
        assert_eq!(vault.get("token").unwrap(), "sk-from-file");
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde(Path::new("/tmp/token.txt")), PathBuf::from("/tmp/token.txt"));
        if let Some(home) = std::env::var_os("HOME").filter(|h| !h.is_empty()) {
            assert_eq!(
                expand_tilde(Path::new("~/token.txt")),
                PathBuf::from(home).join("token.txt")
            );
        }
    }

    #[test]
    fn test_cli_exec_rejects_bad_binding() {
        assert!(Cli::try_parse_from(["llm-secrets", "exec", "--inject", "NOPE", "--", "true"]).is_err());
        assert!(Cli::try_parse_from(["llm-secrets", "exec"]).is_err());
    }
}
