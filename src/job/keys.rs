//! Structured parsing and formatting of the durable key layout
//!
//! Every artifact a job owns lives at a key with one of five shapes:
//!
//! | key | meaning |
//! |---|---|
//! | `{job_id}/jobdata` | driver-written job header |
//! | `{job_id}/task/mapper/{mapper_id}` | one mapper's aggregated output |
//! | `{job_id}/task/reducer/{step_id}/{reducer_id}` | one reducer's output |
//! | `{job_id}/reducerstate.{step_id}` | per-step plan (commit record) |
//! | `{job_id}/result` | final result; terminal |
//!
//! Classification is by exact path-segment parse. Substring matching would
//! misclassify keys under pathological job ids (a job id containing
//! `task/reducer/1`, for instance), so nothing here looks at substrings.

/// One key under a job's prefix, classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKey {
    JobData,
    MapperOutput { mapper_id: u32 },
    ReducerOutput { step_id: u32, reducer_id: u32 },
    ReducerState { step_id: u32 },
    Result,
}

impl TaskKey {
    /// Parse a full object key belonging to `job_id`.
    ///
    /// Returns `None` for keys outside the job's prefix or with an
    /// unrecognized shape.
    pub fn parse(job_id: &str, key: &str) -> Option<TaskKey> {
        let rest = key.strip_prefix(job_id)?.strip_prefix('/')?;

        match rest {
            "jobdata" => return Some(TaskKey::JobData),
            "result" => return Some(TaskKey::Result),
            _ => {}
        }

        if let Some(step) = rest.strip_prefix("reducerstate.") {
            let step_id = step.parse().ok()?;
            return Some(TaskKey::ReducerState { step_id });
        }

        let mut segments = rest.split('/');
        if segments.next()? != "task" {
            return None;
        }
        match segments.next()? {
            "mapper" => {
                let mapper_id = segments.next()?.parse().ok()?;
                segments.next().is_none().then_some(TaskKey::MapperOutput { mapper_id })
            }
            "reducer" => {
                let step_id = segments.next()?.parse().ok()?;
                let reducer_id = segments.next()?.parse().ok()?;
                segments
                    .next()
                    .is_none()
                    .then_some(TaskKey::ReducerOutput { step_id, reducer_id })
            }
            _ => None,
        }
    }

    /// Format this key under `job_id`, inverse of [`TaskKey::parse`].
    pub fn key(&self, job_id: &str) -> String {
        match self {
            TaskKey::JobData => format!("{job_id}/jobdata"),
            TaskKey::MapperOutput { mapper_id } => {
                format!("{job_id}/task/mapper/{mapper_id}")
            }
            TaskKey::ReducerOutput { step_id, reducer_id } => {
                format!("{job_id}/task/reducer/{step_id}/{reducer_id}")
            }
            TaskKey::ReducerState { step_id } => {
                format!("{job_id}/reducerstate.{step_id}")
            }
            TaskKey::Result => format!("{job_id}/result"),
        }
    }
}
