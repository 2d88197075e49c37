use std::time::Duration;
use thiserror::Error;

use crate::invoke::InvokeError;
use crate::lifecycle::LifecycleError;
use crate::store::StorageError;

/// Result type used across the orchestrator.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invocation error: {0}")]
    Invoke(#[from] InvokeError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Mapper {mapper_id} failed: {reason}")]
    MapperFailed { mapper_id: u32, reason: String },

    #[error("Job {job_id} did not produce a result within {elapsed:?}")]
    JobTimeout { job_id: String, elapsed: Duration },

    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    #[error("Job error: {0}")]
    Job(String),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a job-level error
    pub fn job<S: Into<String>>(msg: S) -> Self {
        Self::Job(msg.into())
    }
}
