// ABOUTME: Application-wide error types for pulley.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::runtime::RuntimeError;
use crate::types::ParseImageRefError;

/// Problems that stop a run before any job starts.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("no images to pull")]
    EmptyInput,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid image reference: {0}")]
    InvalidReference(#[from] ParseImageRefError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("{path}:{line}: {source}")]
    ImageList {
        path: PathBuf,
        line: usize,
        source: ParseImageRefError,
    },

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
