//! Built-in reducer handler
//!
//! Merges partial aggregates by summing accumulators for equal keys. The
//! merged mapping goes to `{job_id}/task/reducer/{step_id}/{reducer_id}`,
//! or to `{job_id}/result` when this wave has a single reducer.

use std::time::Instant;
use tracing::warn;

use super::{merge, output_metadata, Aggregate};
use crate::job::{ReducerRequest, TaskKey, TaskReport};
use crate::store::ObjectStore;
use crate::Result;

/// Process one reducer invocation.
pub async fn run(store: &dyn ObjectStore, request: &ReducerRequest) -> Result<TaskReport> {
    let start = Instant::now();

    let mut merged = Aggregate::new();
    let mut lines = 0u64;
    let mut parse_errors = 0u64;

    for key in &request.keys {
        let body = store.get(&request.bucket, key).await?;
        match serde_json::from_slice::<Aggregate>(&body) {
            Ok(partial) => {
                lines += partial.len() as u64;
                merge(&mut merged, partial);
            }
            Err(e) => {
                parse_errors += 1;
                warn!("Skipping undecodable artifact {}: {}", key, e);
            }
        }
    }

    let elapsed_secs = start.elapsed().as_secs_f64();
    let output_key = if request.n_reducers == 1 {
        TaskKey::Result.key(&request.job_id)
    } else {
        TaskKey::ReducerOutput {
            step_id: request.step_id,
            reducer_id: request.reducer_id,
        }
        .key(&request.job_id)
    };

    store
        .put(
            &request.job_bucket,
            &output_key,
            serde_json::to_vec(&merged)?,
            output_metadata(lines, elapsed_secs),
        )
        .await?;

    Ok(TaskReport {
        objects_read: request.keys.len(),
        lines,
        elapsed_secs,
        parse_errors,
    })
}
