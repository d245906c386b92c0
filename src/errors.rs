// src/errors.rs

//! Crate-wide error type and `Result` alias.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolrunError {
    /// The OS refused to create the process (missing binary, permissions).
    #[error("failed to spawn {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument string: {0}")]
    InvalidArguments(String),

    /// The caller's cancellation signal won the race against process exit.
    #[error("invocation was canceled")]
    Canceled,

    #[error("{program} timed out after {after:?}")]
    TimedOut { program: String, after: Duration },

    #[error("{program} exited with code {code}: {stderr}")]
    NonZeroExit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ToolrunError {
    pub fn is_canceled(&self) -> bool {
        matches!(self, ToolrunError::Canceled)
    }
}

pub type Result<T> = std::result::Result<T, ToolrunError>;
