//! Shared job types and the durable key layout
//!
//! Everything a job persists lives under the `{job_id}/` prefix of the job
//! bucket; [`keys::TaskKey`] is the single parser/formatter for that layout.
//! The types here are the named records exchanged between the driver, the
//! coordinator, and the workers.

pub mod keys;
pub mod payload;

pub use keys::TaskKey;
pub use payload::{MapperRequest, ReducerRequest, TaskReport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::DriverConfig;

/// Prefix applied to every function Nimbus installs.
pub const FUNCTION_PREFIX: &str = "nimbus";

/// Metadata key carrying the number of records a worker folded.
pub const META_LINE_COUNT: &str = "linecount";

/// Metadata key carrying a worker's wall time in seconds.
pub const META_PROCESSING_TIME: &str = "processingtime";

/// Metadata key carrying a worker's memory usage in bytes.
pub const META_MEMORY_USAGE: &str = "memoryUsage";

/// A single object in a bucket, as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

/// Immutable per-job settings, constructed once by the driver.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Opaque job identifier; the root prefix for every job artifact.
    pub job_id: String,
    pub input_bucket: String,
    pub input_prefix: String,
    /// Scratch/output bucket; also the event source for the coordinator.
    pub job_bucket: String,
    pub region: Option<String>,
    pub worker_memory_mb: u32,
    pub concurrent_workers: usize,
    pub invoke_timeout: Duration,
    pub connection_pool_size: usize,
    pub mapper_handler: String,
    pub reducer_handler: String,
    pub coordinator_handler: String,
}

impl JobConfig {
    /// Build the per-job configuration from the driver configuration file.
    ///
    /// Function names are derived from the job id so that concurrent jobs
    /// never share a coordinator package.
    pub fn new(config: &DriverConfig, job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            input_bucket: config.bucket.clone(),
            input_prefix: config.prefix.clone(),
            job_bucket: config.job_bucket.clone(),
            region: config.region.clone(),
            worker_memory_mb: config.lambda_memory_mb,
            concurrent_workers: config.concurrent_lambdas,
            invoke_timeout: Duration::from_secs(config.lambda_read_timeout_s),
            connection_pool_size: config.max_connections,
            mapper_handler: config.mapper.handler.clone(),
            reducer_handler: config.reducer.handler.clone(),
            coordinator_handler: config.reducer_coordinator.handler.clone(),
        }
    }

    pub fn mapper_function(&self) -> String {
        format!("{FUNCTION_PREFIX}-mapper-{}", self.job_id)
    }

    pub fn reducer_function(&self) -> String {
        format!("{FUNCTION_PREFIX}-reducer-{}", self.job_id)
    }

    pub fn coordinator_function(&self) -> String {
        format!("{FUNCTION_PREFIX}-coordinator-{}", self.job_id)
    }

    /// Listing prefix covering every artifact the job owns.
    pub fn job_prefix(&self) -> String {
        format!("{}/", self.job_id)
    }

    /// Key prefix whose object-creation events advance the reduce pipeline.
    /// Deliberately excludes the header, state, and result objects.
    pub fn task_prefix(&self) -> String {
        format!("{}/task", self.job_id)
    }
}

/// Static job parameters shipped alongside the coordinator code artifact.
///
/// This file is the only channel through which the driver talks to the
/// coordinator; everything else is reconstructed from the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub job_id: String,
    pub job_bucket: String,
    pub map_count: usize,
    pub reducer_function: String,
    pub reducer_handler: String,
}

/// File name of the serialized [`JobInfo`] next to the coordinator artifact.
pub const JOB_INFO_FILE: &str = "jobinfo.json";

impl JobInfo {
    pub fn new(job: &JobConfig, map_count: usize) -> Self {
        Self {
            job_id: job.job_id.clone(),
            job_bucket: job.job_bucket.clone(),
            map_count,
            reducer_function: job.reducer_function(),
            reducer_handler: job.reducer_handler.clone(),
        }
    }
}

/// Job header written by the driver at `{job_id}/jobdata` before dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHeader {
    pub map_count: usize,
    pub total_objects: usize,
    pub start_time: DateTime<Utc>,
}

/// Per-step plan written at `{job_id}/reducerstate.{step}` when a reduce
/// wave launches. Its presence is the commit record for that wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReducerState {
    pub reducer_count: usize,
    pub total_objects: usize,
    pub start_time: DateTime<Utc>,
}
