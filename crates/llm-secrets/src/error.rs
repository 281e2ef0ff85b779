//! Error types for secret lifecycle operations.
//!
//! Messages carry keys, paths and tool diagnostics. They never carry secret
//! values.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the store manager and lifecycle operations
#[derive(Error, Debug)]
pub enum SecretsError {
    #[error("Secrets file not found: {} - run 'llm-secrets init' first", .0.display())]
    StoreNotFound(PathBuf),

    #[error("Secrets file already exists: {}", .0.display())]
    StoreAlreadyExists(PathBuf),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Required tool not found: {0}")]
    ToolNotAvailable(String),

    #[error("Failed to decrypt: {0}")]
    DecryptionFailed(String),

    #[error("Failed to encrypt: {0}")]
    EncryptionFailed(String),

    #[error("Failed to derive age recipient: {0}")]
    RecipientDerivationFailed(String),

    #[error(
        "No age recipient found. Either:\n  1. Create an age key: age-keygen -o {}\n  2. Or provide --age-recipient",
        .0.display()
    )]
    NoRecipientAvailable(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed secrets content: {0}")]
    Codec(String),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience result alias for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;
