//! Client-side job runner
//!
//! The driver runs a single job to completion: it enumerates the inputs,
//! plans the map batches, installs the worker functions, dispatches the
//! mappers under a concurrency cap, and then polls the job bucket until the
//! result object appears. Reduce scheduling is deliberately not its job:
//! once the mappers are dispatched, object-store events carry the pipeline
//! forward and the job survives a driver crash.

mod dispatch;

pub use dispatch::dispatch_mappers;

use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::Error;
use crate::invoke::Invoker;
use crate::job::{
    JobConfig, JobHeader, TaskKey, TaskReport, META_PROCESSING_TIME,
};
use crate::lifecycle::{FunctionManager, JobArtifacts};
use crate::plan::{make_batches, plan_batch_size};
use crate::store::{ObjectMetadata, ObjectStore};
use crate::Result;

/// How often the driver checks for the result object.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Aggregated job outcome reported to the operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobMetrics {
    pub map_count: usize,
    pub total_input_objects: usize,
    pub total_lines: u64,
    pub total_parse_errors: u64,
    /// Summed wall time across mapper invocations, in seconds.
    pub mapper_secs: f64,
    /// Summed wall time across reducer invocations, in seconds.
    pub reducer_secs: f64,
    /// Wall time observed by the driver, in seconds.
    pub wall_secs: f64,
}

/// Runs one job end to end.
pub struct Driver {
    job: JobConfig,
    store: Arc<dyn ObjectStore>,
    invoker: Arc<dyn Invoker>,
    lifecycle: Option<(FunctionManager, JobArtifacts)>,
    poll_interval: Duration,
    poll_timeout: Option<Duration>,
}

impl Driver {
    pub fn new(job: JobConfig, store: Arc<dyn ObjectStore>, invoker: Arc<dyn Invoker>) -> Self {
        Self {
            job,
            store,
            invoker,
            lifecycle: None,
            poll_interval: POLL_INTERVAL,
            poll_timeout: None,
        }
    }

    /// Install and wire the worker functions before dispatch. Without this
    /// the driver assumes the functions are already in place.
    pub fn with_lifecycle(mut self, manager: FunctionManager, artifacts: JobArtifacts) -> Self {
        self.lifecycle = Some((manager, artifacts));
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Cap the completion wait. On expiry the job aborts without remote
    /// cleanup; abandoned reducers are harmless and the job bucket's TTL
    /// sweep collects their output.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    /// Run the job to completion and report metrics.
    pub async fn run(&self) -> Result<JobMetrics> {
        let started = Instant::now();
        let job = &self.job;

        let inputs = self
            .store
            .list(&job.input_bucket, &job.input_prefix)
            .await?;
        if inputs.is_empty() {
            return Err(Error::job(format!(
                "no input objects under s3://{}/{}",
                job.input_bucket, job.input_prefix
            )));
        }

        let batch_size = plan_batch_size(&inputs, job.worker_memory_mb, job.concurrent_workers);
        let batches = make_batches(&inputs, batch_size);
        let map_count = batches.len();
        info!(
            "Job {}: {} input objects, batch size {}, {} mappers",
            job.job_id,
            inputs.len(),
            batch_size,
            map_count
        );

        if let Some((manager, artifacts)) = &self.lifecycle {
            manager.prepare_job(job, artifacts, map_count).await?;
        }

        let header = JobHeader {
            map_count,
            total_objects: inputs.len(),
            start_time: Utc::now(),
        };
        self.store
            .put(
                &job.job_bucket,
                &TaskKey::JobData.key(&job.job_id),
                serde_json::to_vec(&header)?,
                ObjectMetadata::new(),
            )
            .await?;

        let reports = dispatch_mappers(self.invoker.clone(), job, &batches).await?;
        info!("All {} mappers finished", map_count);

        self.await_result(started).await?;
        info!("Job {} produced its result", job.job_id);

        let reducer_secs = self.collect_reducer_secs().await?;
        Ok(summarize(
            &reports,
            inputs.len(),
            reducer_secs,
            started.elapsed().as_secs_f64(),
        ))
    }

    /// Poll the job prefix until the result object appears.
    async fn await_result(&self, started: Instant) -> Result<()> {
        loop {
            let listing = self
                .store
                .list(&self.job.job_bucket, &self.job.job_prefix())
                .await?;
            let done = listing
                .iter()
                .any(|o| matches!(TaskKey::parse(&self.job.job_id, &o.key), Some(TaskKey::Result)));
            if done {
                return Ok(());
            }

            if let Some(cap) = self.poll_timeout {
                if started.elapsed() >= cap {
                    return Err(Error::JobTimeout {
                        job_id: self.job.job_id.clone(),
                        elapsed: started.elapsed(),
                    });
                }
            }

            debug!("Job {} still running", self.job.job_id);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Sum `processingtime` metadata over the result and every reducer
    /// output, recovering the reduce stage's total compute time.
    async fn collect_reducer_secs(&self) -> Result<f64> {
        let listing = self
            .store
            .list(&self.job.job_bucket, &self.job.job_prefix())
            .await?;

        let mut secs = 0.0;
        for object in &listing {
            let relevant = matches!(
                TaskKey::parse(&self.job.job_id, &object.key),
                Some(TaskKey::Result | TaskKey::ReducerOutput { .. })
            );
            if !relevant {
                continue;
            }
            let metadata = self
                .store
                .metadata(&self.job.job_bucket, &object.key)
                .await?;
            if let Some(value) = metadata.get(META_PROCESSING_TIME) {
                secs += value.parse::<f64>().unwrap_or(0.0);
            }
        }
        Ok(secs)
    }
}

fn summarize(
    reports: &[TaskReport],
    total_input_objects: usize,
    reducer_secs: f64,
    wall_secs: f64,
) -> JobMetrics {
    JobMetrics {
        map_count: reports.len(),
        total_input_objects,
        total_lines: reports.iter().map(|r| r.lines).sum(),
        total_parse_errors: reports.iter().map(|r| r.parse_errors).sum(),
        mapper_secs: reports.iter().map(|r| r.elapsed_secs).sum(),
        reducer_secs,
        wall_secs,
    }
}
