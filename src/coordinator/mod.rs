//! Event-driven reduce scheduler
//!
//! The coordinator is invoked once per object-creation event under the
//! job's task prefix. Each invocation is stateless: it re-derives the job's
//! position from the object store, decides whether a reduce wave is due,
//! dispatches it, and commits the wave's plan as `reducerstate.{step}`.
//!
//! Two events may observe the same completed step and both launch the next
//! wave. That race is tolerated rather than locked out: reducer output keys
//! are deterministic in `(step, reducer)`, the merge is associative and
//! commutative, and rewriting the same plan is idempotent in content, so a
//! duplicate wave overwrites itself.

mod event;
mod state;

pub use event::{S3BucketRef, S3Entity, S3Event, S3EventRecord, S3ObjectRef};
pub use state::{derive_state, JobState};

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::Error;
use crate::invoke::Invoker;
use crate::job::{JobInfo, ObjectRef, ReducerRequest, ReducerState, TaskKey, JOB_INFO_FILE};
use crate::plan::{make_batches, plan_reduce_batch_size};
use crate::store::{ObjectMetadata, ObjectStore};
use crate::Result;

/// Stateless reduce scheduler, constructed fresh for each invocation.
pub struct Coordinator {
    store: Arc<dyn ObjectStore>,
    invoker: Arc<dyn Invoker>,
    info: JobInfo,
}

impl Coordinator {
    pub fn new(store: Arc<dyn ObjectStore>, invoker: Arc<dyn Invoker>, info: JobInfo) -> Self {
        Self {
            store,
            invoker,
            info,
        }
    }

    /// Read the job parameters shipped in the coordinator's package, which
    /// unpacks into its working directory.
    pub async fn load_info() -> Result<JobInfo> {
        Self::load_info_from(std::path::Path::new(".")).await
    }

    /// Read `jobinfo.json` from `dir`.
    ///
    /// A missing or unreadable file is unrecoverable: log it and re-raise so
    /// the runtime records the failure.
    pub async fn load_info_from(dir: &std::path::Path) -> Result<JobInfo> {
        let path = dir.join(JOB_INFO_FILE);
        let body = tokio::fs::read(&path).await.map_err(|e| {
            error!("Cannot read {}: {}", path.display(), e);
            Error::config(format!("missing {}: {e}", path.display()))
        })?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Advance the job by at most one scheduling decision.
    pub async fn handle_event(&self, event: &S3Event) -> Result<()> {
        let bucket = event
            .bucket()
            .ok_or_else(|| Error::MalformedEvent("event carries no records".to_string()))?;

        match derive_state(&self.store, bucket, &self.info).await? {
            JobState::ResultPresent => {
                info!("Job {} done, result present", self.info.job_id);
                Ok(())
            }
            JobState::Mapping {
                completed,
                expected,
            } => {
                info!(
                    "Job {}: {}/{} mappers finished",
                    self.info.job_id, completed, expected
                );
                Ok(())
            }
            JobState::Reducing {
                step_id,
                completed,
                expected,
            } => {
                info!(
                    "Job {}: step {} at {}/{} outputs",
                    self.info.job_id, step_id, completed, expected
                );
                Ok(())
            }
            JobState::MappersDone { outputs } => self.launch_step(bucket, 1, outputs).await,
            JobState::StepComplete { step_id, outputs } => {
                self.launch_step(bucket, step_id + 1, outputs).await
            }
        }
    }

    /// Dispatch one reduce wave over `inputs` and commit its plan.
    ///
    /// The plan write comes after the invocations, matching the original
    /// ordering: a plan with no reducers behind it would wedge the job,
    /// while reducers without a plan just make a later event re-launch the
    /// wave onto the same deterministic keys.
    async fn launch_step(&self, bucket: &str, step_id: u32, inputs: Vec<ObjectRef>) -> Result<()> {
        let batch_size = plan_reduce_batch_size(&inputs);
        let batches = make_batches(&inputs, batch_size);
        let n_reducers = batches.len();

        info!(
            "Job {}: launching step {} with {} reducers over {} artifacts",
            self.info.job_id,
            step_id,
            n_reducers,
            inputs.len()
        );

        for (reducer_id, batch) in batches.iter().enumerate() {
            let request = ReducerRequest {
                bucket: bucket.to_string(),
                keys: batch.iter().map(|o| o.key.clone()).collect(),
                job_bucket: bucket.to_string(),
                job_id: self.info.job_id.clone(),
                n_reducers,
                step_id,
                reducer_id: reducer_id as u32,
            };
            self.invoker
                .invoke_async(&self.info.reducer_function, serde_json::to_value(&request)?)
                .await?;
        }

        let plan = ReducerState {
            reducer_count: n_reducers,
            total_objects: n_reducers * batch_size,
            start_time: Utc::now(),
        };
        self.store
            .put(
                bucket,
                &TaskKey::ReducerState { step_id }.key(&self.info.job_id),
                serde_json::to_vec(&plan)?,
                ObjectMetadata::new(),
            )
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::{InvokeResult, Invoker};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    const BUCKET: &str = "scratch";

    /// Records invocations instead of running anything.
    #[derive(Default)]
    struct RecordingInvoker {
        invocations: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingInvoker {
        fn reducer_requests(&self) -> Vec<ReducerRequest> {
            self.invocations
                .lock()
                .unwrap()
                .iter()
                .map(|(_, v)| serde_json::from_value(v.clone()).unwrap())
                .collect()
        }
    }

    #[async_trait]
    impl Invoker for RecordingInvoker {
        async fn invoke_sync(&self, _function: &str, _payload: Value) -> InvokeResult<Value> {
            unreachable!("coordinator never invokes synchronously")
        }

        async fn invoke_async(&self, function: &str, payload: Value) -> InvokeResult<()> {
            self.invocations
                .lock()
                .unwrap()
                .push((function.to_string(), payload));
            Ok(())
        }
    }

    fn info(map_count: usize) -> JobInfo {
        JobInfo {
            job_id: "j1".to_string(),
            job_bucket: BUCKET.to_string(),
            map_count,
            reducer_function: "nimbus-reducer-j1".to_string(),
            reducer_handler: "reducer.handler".to_string(),
        }
    }

    fn coordinator(
        store: &MemoryStore,
        invoker: Arc<RecordingInvoker>,
        map_count: usize,
    ) -> Coordinator {
        Coordinator::new(Arc::new(store.clone()), invoker, info(map_count))
    }

    async fn seed_mappers(store: &MemoryStore, count: u32) {
        for id in 1..=count {
            store
                .seed(BUCKET, &format!("j1/task/mapper/{id}"), "{}")
                .await;
        }
    }

    fn event() -> S3Event {
        S3Event::object_created(BUCKET, "j1/task/mapper/1")
    }

    #[tokio::test]
    async fn test_incomplete_map_stage_is_a_noop() {
        let store = MemoryStore::new();
        seed_mappers(&store, 2).await;
        let invoker = Arc::new(RecordingInvoker::default());
        coordinator(&store, invoker.clone(), 4)
            .handle_event(&event())
            .await
            .unwrap();
        assert!(invoker.reducer_requests().is_empty());
        assert_eq!(store.list(BUCKET, "j1/reducerstate.").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_mappers_done_launches_step_one() {
        let store = MemoryStore::new();
        seed_mappers(&store, 4).await;
        let invoker = Arc::new(RecordingInvoker::default());
        coordinator(&store, invoker.clone(), 4)
            .handle_event(&event())
            .await
            .unwrap();

        let requests = invoker.reducer_requests();
        // 4 small artifacts, batch floor 2 => 2 reducers.
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.step_id == 1 && r.n_reducers == 2));
        assert_eq!(requests[0].reducer_id, 0);
        assert_eq!(requests[1].reducer_id, 1);

        let body = store.get(BUCKET, "j1/reducerstate.1").await.unwrap();
        let plan: ReducerState = serde_json::from_slice(&body).unwrap();
        assert_eq!(plan.reducer_count, 2);
    }

    #[tokio::test]
    async fn test_single_mapper_goes_straight_to_final_wave() {
        let store = MemoryStore::new();
        seed_mappers(&store, 1).await;
        let invoker = Arc::new(RecordingInvoker::default());
        coordinator(&store, invoker.clone(), 1)
            .handle_event(&event())
            .await
            .unwrap();

        let requests = invoker.reducer_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].n_reducers, 1);
    }

    #[tokio::test]
    async fn test_completed_step_launches_next() {
        let store = MemoryStore::new();
        seed_mappers(&store, 4).await;
        let plan = ReducerState {
            reducer_count: 2,
            total_objects: 4,
            start_time: Utc::now(),
        };
        store
            .put(
                BUCKET,
                "j1/reducerstate.1",
                serde_json::to_vec(&plan).unwrap(),
                ObjectMetadata::new(),
            )
            .await
            .unwrap();
        store.seed(BUCKET, "j1/task/reducer/1/0", "{}").await;
        store.seed(BUCKET, "j1/task/reducer/1/1", "{}").await;

        let invoker = Arc::new(RecordingInvoker::default());
        coordinator(&store, invoker.clone(), 4)
            .handle_event(&event())
            .await
            .unwrap();

        let requests = invoker.reducer_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].step_id, 2);
        assert_eq!(requests[0].n_reducers, 1);
        assert_eq!(
            requests[0].keys,
            vec!["j1/task/reducer/1/0", "j1/task/reducer/1/1"]
        );
    }

    #[tokio::test]
    async fn test_result_present_is_terminal() {
        let store = MemoryStore::new();
        seed_mappers(&store, 1).await;
        store.seed(BUCKET, "j1/result", "{}").await;
        let invoker = Arc::new(RecordingInvoker::default());
        coordinator(&store, invoker.clone(), 1)
            .handle_event(&event())
            .await
            .unwrap();
        assert!(invoker.reducer_requests().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_event_rewrites_identical_plan() {
        let store = MemoryStore::new();
        seed_mappers(&store, 4).await;
        let invoker = Arc::new(RecordingInvoker::default());
        let coordinator = coordinator(&store, invoker.clone(), 4);

        coordinator.handle_event(&event()).await.unwrap();
        let first: ReducerState =
            serde_json::from_slice(&store.get(BUCKET, "j1/reducerstate.1").await.unwrap()).unwrap();

        // Same completion observed twice: the wave is re-dispatched onto the
        // same keys and the plan is rewritten with identical content.
        coordinator.handle_event(&event()).await.unwrap();
        let second: ReducerState =
            serde_json::from_slice(&store.get(BUCKET, "j1/reducerstate.1").await.unwrap()).unwrap();

        assert_eq!(first.reducer_count, second.reducer_count);
        assert_eq!(first.total_objects, second.total_objects);
        assert_eq!(invoker.reducer_requests().len(), 4);
        let requests = invoker.reducer_requests();
        assert_eq!(requests[0].keys, requests[2].keys);
        assert_eq!(requests[1].keys, requests[3].keys);
    }

    #[tokio::test]
    async fn test_load_info_round_trips_staged_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let staged = info(4);
        tokio::fs::write(
            dir.path().join(JOB_INFO_FILE),
            serde_json::to_vec(&staged).unwrap(),
        )
        .await
        .unwrap();

        let loaded = Coordinator::load_info_from(dir.path()).await.unwrap();
        assert_eq!(loaded, staged);
    }

    #[tokio::test]
    async fn test_load_info_missing_file_is_config_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Coordinator::load_info_from(dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_event_without_records_is_malformed() {
        let store = MemoryStore::new();
        let invoker = Arc::new(RecordingInvoker::default());
        let err = coordinator(&store, invoker, 1)
            .handle_event(&S3Event { records: vec![] })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedEvent(_)));
    }
}
