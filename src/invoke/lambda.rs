//! Lambda invocation backend

use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use aws_sdk_lambda::Client;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;

use super::{InvokeError, InvokeResult, Invoker};

/// Invoker backed by the Lambda service.
///
/// In-flight requests are capped at the configured connection pool size so
/// the client never queues more sockets than the pool can serve. The
/// driver's own concurrency cap applies on top of this.
pub struct LambdaInvoker {
    client: Client,
    connections: Arc<Semaphore>,
}

impl LambdaInvoker {
    pub fn new(client: Client, pool_size: usize) -> Self {
        Self {
            client,
            connections: Arc::new(Semaphore::new(pool_size.max(1))),
        }
    }

    async fn invoke(
        &self,
        function: &str,
        payload: Value,
        invocation_type: InvocationType,
    ) -> InvokeResult<Option<Blob>> {
        let _permit = self
            .connections
            .acquire()
            .await
            .map_err(InvokeError::request)?;

        debug!("Invoking {} ({:?})", function, invocation_type);

        let output = self
            .client
            .invoke()
            .function_name(function)
            .invocation_type(invocation_type)
            .payload(Blob::new(serde_json::to_vec(&payload)?))
            .send()
            .await
            .map_err(|e| InvokeError::request(e.into_service_error()))?;

        if let Some(reason) = output.function_error() {
            let detail = output
                .payload()
                .map(|b| String::from_utf8_lossy(b.as_ref()).into_owned())
                .unwrap_or_default();
            return Err(InvokeError::failed(function, format!("{reason}: {detail}")));
        }

        Ok(output.payload)
    }
}

#[async_trait]
impl Invoker for LambdaInvoker {
    async fn invoke_sync(&self, function: &str, payload: Value) -> InvokeResult<Value> {
        let blob = self
            .invoke(function, payload, InvocationType::RequestResponse)
            .await?
            .ok_or_else(|| InvokeError::failed(function, "empty response payload"))?;
        Ok(serde_json::from_slice(blob.as_ref())?)
    }

    async fn invoke_async(&self, function: &str, payload: Value) -> InvokeResult<()> {
        self.invoke(function, payload, InvocationType::Event).await?;
        Ok(())
    }
}
