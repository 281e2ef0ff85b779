//! llm-secrets - sops wrapper for the AI agent era
//!
//! "Secrets should be usable without being seen."
//!
//! An assistant reading terminal output or shell history must never see a
//! full secret value. Values live in a single sops-encrypted YAML file;
//! this crate reads and rewrites that file through the external `sops`
//! binary, replaces it atomically on every change, and hands values out
//! either masked (`peek`), raw for pipelines (`get`), or injected into a
//! child process environment (`inject_and_run`).
//!
//! Requires `sops` and `age` at runtime. No cryptography happens here.

pub mod codec;
pub mod config;
pub mod error;
pub mod mask;
pub mod store;
pub mod tool;
pub mod vault;

pub use codec::SecretMap;
pub use config::Config;
pub use error::{Result, SecretsError};
pub use mask::mask;
pub use store::Store;
pub use tool::{EncryptionTool, FakeTool, SopsTool, ToolCall};
pub use vault::{EnvBinding, InitOptions, Injection, Secret, Status, Vault};
