//! External encryption tool seam.
//!
//! Every subprocess the store depends on goes through [`EncryptionTool`].
//! [`SopsTool`] shells out to `sops` and `age-keygen`; [`FakeTool`] keeps
//! everything in-process so the store and vault can be exercised without
//! either binary installed.

mod fake;
mod sops;

use std::path::Path;

use zeroize::Zeroizing;

use crate::error::Result;

pub use fake::{FakeTool, ToolCall};
pub use sops::SopsTool;

/// Encrypt/decrypt a store file and derive recipients via an external tool.
pub trait EncryptionTool: Send + Sync {
    /// Decrypt the file at `path`, returning the plaintext.
    fn decrypt(&self, path: &Path) -> Result<Zeroizing<Vec<u8>>>;

    /// Replace the plaintext file at `path` with its encrypted form.
    fn encrypt_in_place(&self, path: &Path) -> Result<()>;

    /// Derive the public recipient for the private key at `private_key`.
    fn derive_recipient(&self, private_key: &Path) -> Result<String>;

    /// Whether `tool` can be run. Never fails.
    fn check_available(&self, tool: &str) -> bool;
}
