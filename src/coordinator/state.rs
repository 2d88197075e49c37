//! Job state derivation
//!
//! The coordinator keeps no state between invocations. On every event it
//! lists the job's prefix, classifies each key, and reconstructs where the
//! job stands. The derived state is the input to exactly one scheduling
//! decision; nothing here performs writes.

use std::sync::Arc;

use crate::job::{JobInfo, ObjectRef, ReducerState, TaskKey};
use crate::store::ObjectStore;
use crate::Result;

/// Where a job stands, reconstructed from one listing of its prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// `{job_id}/result` exists; the job is terminal.
    ResultPresent,
    /// The map stage is still running.
    Mapping { completed: usize, expected: usize },
    /// All mapper outputs are present and no reduce step has launched.
    MappersDone { outputs: Vec<ObjectRef> },
    /// Step `step_id` has launched but its outputs are incomplete.
    Reducing {
        step_id: u32,
        completed: usize,
        expected: usize,
    },
    /// Step `step_id` has produced all of its outputs.
    StepComplete { step_id: u32, outputs: Vec<ObjectRef> },
}

/// Derive the job's state from the store.
///
/// The current step is the highest `k` for which `reducerstate.{k}` exists;
/// that object's plan tells us how many outputs the step owes. Keys that do
/// not parse as part of the layout are ignored.
pub async fn derive_state(
    store: &Arc<dyn ObjectStore>,
    bucket: &str,
    info: &JobInfo,
) -> Result<JobState> {
    let listing = store.list(bucket, &format!("{}/", info.job_id)).await?;

    let mut mapper_outputs = Vec::new();
    let mut current_step = 0u32;
    let mut result_present = false;

    for object in &listing {
        match TaskKey::parse(&info.job_id, &object.key) {
            Some(TaskKey::Result) => result_present = true,
            Some(TaskKey::MapperOutput { .. }) => mapper_outputs.push(object.clone()),
            Some(TaskKey::ReducerState { step_id }) => current_step = current_step.max(step_id),
            _ => {}
        }
    }

    if result_present {
        return Ok(JobState::ResultPresent);
    }

    if current_step == 0 {
        if mapper_outputs.len() < info.map_count {
            return Ok(JobState::Mapping {
                completed: mapper_outputs.len(),
                expected: info.map_count,
            });
        }
        return Ok(JobState::MappersDone {
            outputs: mapper_outputs,
        });
    }

    let state_key = TaskKey::ReducerState {
        step_id: current_step,
    }
    .key(&info.job_id);
    let body = store.get(bucket, &state_key).await?;
    let plan: ReducerState = serde_json::from_slice(&body)?;

    let step_outputs: Vec<ObjectRef> = listing
        .iter()
        .filter(|o| {
            matches!(
                TaskKey::parse(&info.job_id, &o.key),
                Some(TaskKey::ReducerOutput { step_id, .. }) if step_id == current_step
            )
        })
        .cloned()
        .collect();

    if step_outputs.len() < plan.reducer_count {
        return Ok(JobState::Reducing {
            step_id: current_step,
            completed: step_outputs.len(),
            expected: plan.reducer_count,
        });
    }

    Ok(JobState::StepComplete {
        step_id: current_step,
        outputs: step_outputs,
    })
}
