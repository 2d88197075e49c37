//! Shared fixtures for the integration tests

use std::sync::Arc;
use std::time::{Duration, Instant};

use nimbus::driver::{Driver, JobMetrics};
use nimbus::invoke::LocalInvoker;
use nimbus::job::{JobConfig, JobInfo};
use nimbus::store::{MemoryStore, ObjectStore};
use nimbus::Result;

pub const INPUT_BUCKET: &str = "inputs";
pub const JOB_BUCKET: &str = "scratch";

pub fn job_config(job_id: &str, concurrent_workers: usize) -> JobConfig {
    JobConfig {
        job_id: job_id.to_string(),
        input_bucket: INPUT_BUCKET.to_string(),
        input_prefix: "logs/".to_string(),
        job_bucket: JOB_BUCKET.to_string(),
        region: None,
        worker_memory_mb: 1024,
        concurrent_workers,
        invoke_timeout: Duration::from_secs(300),
        connection_pool_size: 50,
        mapper_handler: "mapper.handler".to_string(),
        reducer_handler: "reducer.handler".to_string(),
        coordinator_handler: "coordinator.handler".to_string(),
    }
}

/// Seed one input object per entry under the `logs/` prefix.
pub async fn seed_inputs(store: &MemoryStore, bodies: &[&str]) {
    for (i, body) in bodies.iter().enumerate() {
        store
            .seed(INPUT_BUCKET, &format!("logs/part-{i:03}"), *body)
            .await;
    }
}

/// Run a job end to end with the in-process invoker.
///
/// `map_count` must match the batch count the driver will plan, since the
/// in-process coordinator learns it up front the way a deployed one learns
/// it from its packaged job info.
pub async fn run_job(store: &MemoryStore, job: JobConfig, map_count: usize) -> Result<JobMetrics> {
    let info = JobInfo::new(&job, map_count);
    let invoker = Arc::new(LocalInvoker::new(store.clone(), info));
    Driver::new(job, Arc::new(store.clone()), invoker)
        .with_poll_interval(Duration::from_millis(10))
        .with_poll_timeout(Duration::from_secs(30))
        .run()
        .await
}

/// Wait until the result object exists and trailing writes have settled.
pub async fn await_quiescent_result(store: &MemoryStore, bucket: &str, job_id: &str) {
    let deadline = Instant::now() + Duration::from_secs(10);

    loop {
        let present = !store
            .list(bucket, &format!("{job_id}/result"))
            .await
            .unwrap()
            .is_empty();
        if present {
            break;
        }
        assert!(Instant::now() < deadline, "job {job_id} produced no result");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut last = store.len().await;
    let mut stable_rounds = 0;
    while stable_rounds < 3 {
        assert!(Instant::now() < deadline, "job {job_id} never settled");
        tokio::time::sleep(Duration::from_millis(20)).await;
        let now = store.len().await;
        if now == last {
            stable_rounds += 1;
        } else {
            stable_rounds = 0;
            last = now;
        }
    }
}
