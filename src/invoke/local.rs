//! In-process invocation backend
//!
//! Runs the built-in handlers against a [`MemoryStore`] and synthesizes the
//! object-creation events that S3 would deliver, so a whole job runs
//! deterministically with no remote services.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::{InvokeError, InvokeResult, Invoker};
use crate::coordinator::{Coordinator, S3Event};
use crate::job::{JobInfo, MapperRequest, ReducerRequest, TaskKey};
use crate::store::MemoryStore;
use crate::worker::{mapper, reducer};

/// Invoker that executes handlers in process.
///
/// Synchronous invocations are mappers and asynchronous ones are reducers;
/// those are the only two functions the fleet has.
#[derive(Clone)]
pub struct LocalInvoker {
    store: MemoryStore,
    info: JobInfo,
}

impl LocalInvoker {
    pub fn new(store: MemoryStore, info: JobInfo) -> Self {
        Self { store, info }
    }

    fn coordinator(&self) -> Coordinator {
        Coordinator::new(
            Arc::new(self.store.clone()),
            Arc::new(self.clone()),
            self.info.clone(),
        )
    }

    /// Deliver the object-creation event S3 would send. The production
    /// notification is filtered to the task prefix, so only mapper and
    /// reducer outputs trigger the coordinator here too.
    fn notify_object_created(&self, bucket: &str, key: &str) {
        let task_prefix = format!("{}/task", self.info.job_id);
        if !key.starts_with(&task_prefix) {
            return;
        }

        let event = S3Event::object_created(bucket, key);
        let coordinator = self.coordinator();
        tokio::spawn(async move {
            if let Err(e) = coordinator.handle_event(&event).await {
                warn!("Coordinator invocation failed: {}", e);
            }
        });
    }
}

#[async_trait]
impl Invoker for LocalInvoker {
    async fn invoke_sync(&self, function: &str, payload: Value) -> InvokeResult<Value> {
        let request: MapperRequest = serde_json::from_value(payload)?;
        let output_key = TaskKey::MapperOutput {
            mapper_id: request.mapper_id,
        }
        .key(&request.job_id);

        let report = mapper::run(&self.store, &request)
            .await
            .map_err(|e| InvokeError::failed(function, e))?;

        self.notify_object_created(&request.job_bucket, &output_key);
        Ok(serde_json::to_value(report)?)
    }

    async fn invoke_async(&self, function: &str, payload: Value) -> InvokeResult<()> {
        let request: ReducerRequest = serde_json::from_value(payload)?;
        let this = self.clone();
        let function = function.to_string();

        tokio::spawn(async move {
            let output_key = if request.n_reducers == 1 {
                TaskKey::Result.key(&request.job_id)
            } else {
                TaskKey::ReducerOutput {
                    step_id: request.step_id,
                    reducer_id: request.reducer_id,
                }
                .key(&request.job_id)
            };
            let job_bucket = request.job_bucket.clone();

            match reducer::run(&this.store, &request).await {
                Ok(_) => this.notify_object_created(&job_bucket, &output_key),
                Err(e) => warn!("Reducer {} failed: {}", function, e),
            }
        });

        Ok(())
    }
}
