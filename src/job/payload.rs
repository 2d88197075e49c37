//! Wire payloads exchanged with worker invocations
//!
//! Field names are camelCase on the wire. The worker return value is the
//! named [`TaskReport`] record rather than a positional array; both ends of
//! the wire live in this crate, so nothing depends on index positions.

use serde::{Deserialize, Serialize};

/// Synchronous mapper invocation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapperRequest {
    /// Bucket holding the input objects.
    pub bucket: String,
    pub keys: Vec<String>,
    pub job_bucket: String,
    pub job_id: String,
    /// 1-based; mapper ids form the contiguous range `[1, map_count]`.
    pub mapper_id: u32,
}

/// Asynchronous reducer invocation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReducerRequest {
    /// Bucket holding this wave's input artifacts (the job bucket).
    pub bucket: String,
    pub keys: Vec<String>,
    pub job_bucket: String,
    pub job_id: String,
    /// Reducer count for this wave; 1 means the output is the final result.
    pub n_reducers: usize,
    pub step_id: u32,
    /// 0-based index within the wave.
    pub reducer_id: u32,
}

/// What a worker reports back after writing its output object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    /// Number of input objects read.
    pub objects_read: usize,
    /// Records folded into the output.
    pub lines: u64,
    /// Wall time spent in the handler, in seconds.
    pub elapsed_secs: f64,
    /// Records skipped because they failed to parse. Informational; parse
    /// failures never fail the job.
    pub parse_errors: u64,
}
