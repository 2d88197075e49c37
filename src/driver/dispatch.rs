//! Bounded-concurrency mapper dispatch
//!
//! A counting semaphore keeps exactly `concurrent_workers` synchronous
//! invocations in flight, dispatching the next batch as soon as a permit
//! frees. The remote service enforces a concurrency ceiling and rejects
//! excess invocations, so an unbounded fan-out is not an option; neither is
//! chunked dispatch, which idles the fleet at every chunk boundary.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::error::Error;
use crate::invoke::Invoker;
use crate::job::{JobConfig, MapperRequest, TaskReport};
use crate::plan::Batch;
use crate::Result;

/// Invoke one mapper per batch and collect every report.
///
/// Mappers are synchronous and their failure is fatal to the job: the first
/// failed invocation aborts the dispatch and surfaces as
/// [`Error::MapperFailed`].
pub async fn dispatch_mappers(
    invoker: Arc<dyn Invoker>,
    job: &JobConfig,
    batches: &[Batch],
) -> Result<Vec<TaskReport>> {
    let semaphore = Arc::new(Semaphore::new(job.concurrent_workers.max(1)));
    let mut futures = FuturesUnordered::new();
    let function = job.mapper_function();

    info!(
        "Dispatching {} mappers (max {} in flight)",
        batches.len(),
        job.concurrent_workers
    );

    for (index, batch) in batches.iter().enumerate() {
        let mapper_id = (index + 1) as u32;
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::job(format!("failed to acquire dispatch permit: {e}")))?;

        let request = MapperRequest {
            bucket: job.input_bucket.clone(),
            keys: batch.iter().map(|o| o.key.clone()).collect(),
            job_bucket: job.job_bucket.clone(),
            job_id: job.job_id.clone(),
            mapper_id,
        };
        let invoker = invoker.clone();
        let function = function.clone();

        futures.push(tokio::spawn(async move {
            let payload = serde_json::to_value(&request)?;
            let response = invoker.invoke_sync(&function, payload).await.map_err(|e| {
                Error::MapperFailed {
                    mapper_id,
                    reason: e.to_string(),
                }
            })?;
            let report: TaskReport = serde_json::from_value(response)?;
            debug!(
                "Mapper {} finished: {} objects, {} lines in {:.2}s",
                mapper_id, report.objects_read, report.lines, report.elapsed_secs
            );
            drop(permit);
            Ok::<TaskReport, Error>(report)
        }));
    }

    let mut reports = Vec::with_capacity(batches.len());
    while let Some(joined) = futures.next().await {
        reports.push(joined??);
    }

    Ok(reports)
}
