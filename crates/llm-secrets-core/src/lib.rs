//! llm-secrets core - Shared functionality for the llm-secrets tool
//!
//! Path resolution and external binary probing. Nothing here touches
//! secret values.

pub mod paths;
pub mod process;

pub use paths::Paths;
