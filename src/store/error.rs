//! Error types for the object store layer

use std::fmt;
use thiserror::Error;

/// Result type for object store operations
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Object not found
    #[error("Not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Request against the backend failed
    #[error("Request error: {0}")]
    Request(String),

    /// Backend connection failed
    #[error("Connection error: {0}")]
    Connection(String),
}

impl StorageError {
    /// Create a serialization error
    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Create a not-found error
    pub fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Create a request error
    pub fn request<E: fmt::Display>(err: E) -> Self {
        Self::Request(err.to_string())
    }

    /// Create a connection error
    pub fn connection<E: fmt::Display>(err: E) -> Self {
        Self::Connection(err.to_string())
    }
}
