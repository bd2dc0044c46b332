//! Error types for the code sandbox.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the code sandbox.
///
/// Only [`SandboxError::Storage`] is ever returned from the public run
/// operations; every other failure is folded into an `ExecutionResult`.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to write temporary artifact {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch interpreter '{interpreter}': {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unknown profile '{name}' (known: {known})")]
    UnknownProfile { name: String, known: String },
}

pub type Result<T> = std::result::Result<T, SandboxError>;
