//! Error types for fleet-bench-core

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Classification of a [`BenchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid or missing configuration
    Config,
    /// API misuse, such as activating interception twice
    Usage,
    /// Task definition or workload script could not be prepared
    Task,
    /// Run could not be orchestrated
    Orchestration,
    /// Filesystem error
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => write!(f, "configuration error"),
            ErrorKind::Usage => write!(f, "usage error"),
            ErrorKind::Task => write!(f, "task error"),
            ErrorKind::Orchestration => write!(f, "orchestration error"),
            ErrorKind::Io => write!(f, "IO error"),
        }
    }
}

/// Core error type
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct BenchError {
    /// Error classification
    pub kind: ErrorKind,
    /// Human readable detail
    pub message: String,
}

impl BenchError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Invalid configuration
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// A required builder field was not set
    pub fn missing_config(field: &str) -> Self {
        Self::config(format!("missing required field `{field}`"))
    }

    /// API misuse
    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, message)
    }

    /// Task preparation failure
    pub fn task(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Task, message)
    }

    /// Orchestration failure
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Orchestration, message)
    }

    /// Filesystem failure with context
    pub fn io(context: impl std::fmt::Display, err: &std::io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("{context}: {err}"))
    }
}

impl From<ConfigError> for BenchError {
    fn from(err: ConfigError) -> Self {
        Self::config(err.to_string())
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;
