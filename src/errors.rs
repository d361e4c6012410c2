//! Structured error handling for the EatLock core
//!
//! One error enum covers the validation, crypto, persistence and
//! aggregation failure classes; everything else in the crate returns
//! `EatLockResult`.

use thiserror::Error;

/// Main error type for the EatLock core
#[derive(Error, Debug)]
pub enum EatLockError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database operation failed: {operation} - {source}")]
    Database {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Encryption operation failed: {operation}")]
    Encryption { operation: String },

    #[error("Cryptographic operation failed: {message}")]
    Crypto { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Update failed: {operation} - {message}")]
    Update { operation: String, message: String },

    #[error("Delete failed: {operation} - {message}")]
    Delete { operation: String, message: String },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource not found: {resource} - {id}")]
    NotFound { resource: String, id: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Result with EatLockError
pub type EatLockResult<T> = Result<T, EatLockError>;

impl EatLockError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a database error
    pub fn database(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Database {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create an encryption error
    pub fn encryption(operation: impl Into<String>) -> Self {
        Self::Encryption {
            operation: operation.into(),
        }
    }

    /// Create a cryptographic error
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an update error (persistence failure after rollback)
    pub fn update(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Update {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a delete error
    pub fn delete(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delete {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Convert from sled errors
impl From<sled::Error> for EatLockError {
    fn from(err: sled::Error) -> Self {
        EatLockError::database("sled_operation", err)
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for EatLockError {
    fn from(err: serde_json::Error) -> Self {
        EatLockError::serialization("json_operation", err)
    }
}

/// Convert from std::io errors
impl From<std::io::Error> for EatLockError {
    fn from(err: std::io::Error) -> Self {
        EatLockError::io("io_operation", err)
    }
}
