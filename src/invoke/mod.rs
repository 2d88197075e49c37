//! Remote function invocation abstraction
//!
//! Mappers are invoked synchronously (the driver needs their reports and
//! treats a failure as fatal); reducers are fire-and-forget events whose
//! completion is observed through the object store. [`LambdaInvoker`] is the
//! production backend; [`LocalInvoker`] runs the built-in handlers in
//! process so a whole job can execute without a deployed fleet.

mod lambda;
mod local;

pub use lambda::LambdaInvoker;
pub use local::LocalInvoker;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type for invocation operations
pub type InvokeResult<T> = Result<T, InvokeError>;

#[derive(Error, Debug)]
pub enum InvokeError {
    /// Payload could not be encoded or a response could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The invoked function reported an error
    #[error("Function {function} failed: {reason}")]
    Failed { function: String, reason: String },

    /// The invoke request itself failed
    #[error("Request error: {0}")]
    Request(String),
}

impl InvokeError {
    /// Create a request error
    pub fn request<E: fmt::Display>(err: E) -> Self {
        Self::Request(err.to_string())
    }

    /// Create a function-failure error
    pub fn failed<S: fmt::Display>(function: &str, reason: S) -> Self {
        Self::Failed {
            function: function.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Invocation interface for the remote compute fleet.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Request/response invocation; returns the function's decoded response.
    async fn invoke_sync(&self, function: &str, payload: Value) -> InvokeResult<Value>;

    /// Fire-and-forget invocation; returns once the event is accepted.
    async fn invoke_async(&self, function: &str, payload: Value) -> InvokeResult<()>;
}
