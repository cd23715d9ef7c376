//! Error types for ncapi-rs.

use thiserror::Error;

use crate::status::Status;

/// Result type alias for ncapi-rs operations.
pub type Result<T> = std::result::Result<T, NcError>;

/// Errors raised by the device, graph and fifo wrappers.
#[derive(Debug, Error)]
pub enum NcError {
    /// A native call returned a non-success status.
    #[error("{call} failed: {status}")]
    Native {
        /// Native entry point that reported the failure.
        call: &'static str,
        /// Translated status kind.
        status: Status,
    },

    /// A local invariant was violated; nothing was sent to the driver.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// The object was already released.
    #[error("{0} has already been disposed")]
    Disposed(&'static str),

    /// Tensor data did not fit the fifo it was meant for.
    #[error("Invalid tensor: {0}")]
    Tensor(String),

    /// The driver library could not be loaded.
    #[error("Driver library error: {0}")]
    Library(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NcError {
    /// Create a precondition error.
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a tensor error.
    pub fn tensor(msg: impl Into<String>) -> Self {
        Self::Tensor(msg.into())
    }

    /// Create a driver library error.
    pub fn library(msg: impl Into<String>) -> Self {
        Self::Library(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The native status carried by this error, if it came from the driver.
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Native { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the operation was rejected before reaching the driver.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_) | Self::Disposed(_))
    }
}
