//! Error types for the policy enforcement core.

use thiserror::Error;

/// Result type alias for the policy enforcement core.
pub type Result<T, E = PolicyError> = std::result::Result<T, E>;

/// Main error type for the policy enforcement core.
///
/// These are *not* the unit of SAML constraint reporting; constraint
/// violations accumulate as [`crate::validation::ValidationError`] values.
/// A `PolicyError` means the assertion could not even attempt a decision:
/// broken configuration, malformed message shape, or a failing backend.
#[derive(Error, Debug)]
pub enum PolicyError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Contract violations: an assertion was wired up incorrectly.
    /// Not meant to be caught by policy logic; the assertion itself
    /// is broken and construction should have failed.
    #[error("Policy contract violation: {message}")]
    Contract { message: String },

    /// Certificate handling errors
    #[error("Certificate error: {message}")]
    Certificate { message: String },

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Operation failed: {message}")]
    OperationFailed { message: String },

    #[error("Storage backend not available")]
    BackendUnavailable,
}

impl PolicyError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new contract violation error
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract {
            message: message.into(),
        }
    }

    /// Create a new certificate error
    pub fn certificate(message: impl Into<String>) -> Self {
        Self::Certificate {
            message: message.into(),
        }
    }
}

impl StorageError {
    /// Create a new connection failed error
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
        }
    }

    /// Create a new operation failed error
    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::OperationFailed {
            message: message.into(),
        }
    }
}
