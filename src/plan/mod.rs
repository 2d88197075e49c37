//! Pure functions for batch planning
//!
//! These functions size worker batches from object-size statistics and
//! partition input listings into the per-invocation work lists handed to
//! mappers and reducers. No I/O happens here.

use crate::job::ObjectRef;

/// Fraction of a worker's memory available for input data; the rest is
/// headroom for the runtime and the handler itself.
pub const DATA_MEMORY_FRACTION: f64 = 0.6;

/// Effective memory budget used when sizing reduce batches, in MB.
pub const REDUCE_MEMORY_MB: u32 = 1536;

/// Concurrency assumed when sizing reduce batches.
pub const REDUCE_MAX_WORKERS: usize = 1000;

/// An ordered slice of input objects assigned to a single worker invocation.
pub type Batch = Vec<ObjectRef>;

/// Calculate the number of objects a single map worker should receive.
///
/// Small datasets fan out fully (one object per worker) for latency; large
/// datasets amortize the fixed invocation cost by packing as many objects as
/// fit in the data fraction of worker memory. Sizing is by count against the
/// average object size rather than by exact byte sum: determinism and
/// simplicity beat perfect bin-packing when object sizes are within an order
/// of magnitude of each other.
///
/// # Arguments
///
/// * `objects` - Input object descriptors (only sizes are inspected)
/// * `memory_mb` - Worker memory in MB
/// * `max_workers` - Maximum concurrent worker invocations
pub fn plan_batch_size(objects: &[ObjectRef], memory_mb: u32, max_workers: usize) -> usize {
    if objects.is_empty() {
        return 1;
    }

    let max_data_bytes = DATA_MEMORY_FRACTION * f64::from(memory_mb) * 1_000_000.0;
    let total: u64 = objects.iter().map(|o| o.size).sum();
    if total == 0 {
        // Degenerate listing of empty objects; one worker takes them all.
        return objects.len();
    }
    let avg = total as f64 / objects.len() as f64;

    if avg < max_data_bytes && objects.len() < max_workers {
        return 1;
    }

    ((max_data_bytes / avg).round() as usize).max(1)
}

/// Calculate the batch size for a reduce wave.
///
/// Uses a larger effective memory budget than the map stage and floors the
/// result at 2 so that every wave at least halves the number of artifacts;
/// without the floor a wave could fail to shrink the input set and the job
/// would never reach its fixed point.
pub fn plan_reduce_batch_size(objects: &[ObjectRef]) -> usize {
    plan_batch_size(objects, REDUCE_MEMORY_MB, REDUCE_MAX_WORKERS).max(2)
}

/// Partition objects into batches of `batch_size`, preserving input order.
///
/// Every object appears in exactly one batch and concatenating the output
/// reproduces the input; the final batch may be shorter.
pub fn make_batches(objects: &[ObjectRef], batch_size: usize) -> Vec<Batch> {
    if objects.is_empty() || batch_size == 0 {
        return vec![];
    }

    objects
        .chunks(batch_size)
        .map(|chunk| chunk.to_vec())
        .collect()
}
