//! Error types for bulkxfer
//!
//! This module defines all error types used throughout the crate. Per-item
//! transfer failures are captured into results as `Arc<XferError>` rather
//! than propagated, so only configuration and job-level problems ever reach
//! a caller as an `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for bulkxfer operations
#[derive(Error, Debug)]
pub enum XferError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid builder state or CLI input
    #[error("Configuration error: {0}")]
    Config(String),

    /// Object does not exist in the bucket
    #[error("Object not found: gs://{bucket}/{name}")]
    NotFound { bucket: String, name: String },

    /// A generation/metageneration/existence precondition did not hold
    #[error("Precondition failed for gs://{bucket}/{name}: {message}")]
    PreconditionFailed {
        bucket: String,
        name: String,
        message: String,
    },

    /// A `DoesNotExist` precondition failed because the object is live
    #[error("Object already exists: gs://{bucket}/{name}")]
    AlreadyExists { bucket: String, name: String },

    /// Any other fault raised by the storage collaborator
    #[error("Storage error: {0}")]
    Storage(String),

    /// Operation not offered by the storage collaborator
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Object name or local path cannot be mapped safely
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Admission refused by the QoS gate
    #[error("Rejected by QoS gate: {0}")]
    Rejected(String),

    /// Item never started because its job was cancelled
    #[error("Transfer cancelled before it started")]
    Cancelled,

    /// A transfer task panicked
    #[error("Transfer task panicked: {0}")]
    Panicked(String),

    /// The worker pool is closed and accepts no more work
    #[error("Worker pool has been shut down")]
    PoolShutdown,

    /// Worker threads could not be started
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Results stopped arriving before every item resolved
    #[error("Job aborted: received {received} of {expected} results")]
    JobAborted { expected: usize, received: usize },
}

impl XferError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a storage fault
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Create a precondition failure
    pub fn precondition(
        bucket: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::PreconditionFailed {
            bucket: bucket.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create the failure of a `DoesNotExist` precondition
    pub fn already_exists(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    /// Check if this error is a failed precondition of any kind
    pub fn is_precondition_failure(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. } | Self::AlreadyExists { .. })
    }

    /// Check if this error reports that the target object already exists
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Check if this error reports a missing object
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Get the local path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for bulkxfer operations
pub type Result<T> = std::result::Result<T, XferError>;

impl From<std::io::Error> for XferError {
    fn from(err: std::io::Error) -> Self {
        XferError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for XferError {
    fn from(err: serde_json::Error) -> Self {
        XferError::Config(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| XferError::io(path, e))
    }
}
