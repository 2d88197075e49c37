//! Built-in mapper and reducer handlers
//!
//! These implement the worker I/O contract: read the assigned keys, fold
//! them into a key → accumulator mapping, write one output object with the
//! `linecount`/`processingtime`/`memoryUsage` metadata triple, and return a
//! [`crate::job::TaskReport`].

pub mod mapper;
pub mod reducer;

use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock};
use sysinfo::System;

use crate::job::{META_LINE_COUNT, META_MEMORY_USAGE, META_PROCESSING_TIME};
use crate::store::ObjectMetadata;

/// The mapping every worker emits: key to numeric accumulator.
///
/// Ordered so that equal aggregates serialize to equal bytes; re-running a
/// worker over the same inputs overwrites its output with identical content.
pub type Aggregate = BTreeMap<String, f64>;

/// Fold one partial aggregate into another by summing accumulators.
///
/// This is the merge the whole reduce tree is built on. It must stay
/// associative and commutative: reducers consume arbitrary slices of the
/// previous wave in arbitrary order, so any grouping of the inputs has to
/// produce the same final mapping.
pub fn merge(into: &mut Aggregate, from: Aggregate) {
    for (key, value) in from {
        *into.entry(key).or_insert(0.0) += value;
    }
}

/// Metadata attached to every worker output object.
pub(crate) fn output_metadata(lines: u64, elapsed_secs: f64) -> ObjectMetadata {
    let mut metadata = ObjectMetadata::new();
    metadata.insert(META_LINE_COUNT.to_string(), lines.to_string());
    metadata.insert(META_PROCESSING_TIME.to_string(), elapsed_secs.to_string());
    metadata.insert(
        META_MEMORY_USAGE.to_string(),
        used_memory_bytes().to_string(),
    );
    metadata
}

fn used_memory_bytes() -> u64 {
    // One probe per process, refreshed in place; invocations only pay for
    // the refresh, not a full system re-enumeration.
    static SYSTEM: OnceLock<Mutex<System>> = OnceLock::new();
    let probe = SYSTEM.get_or_init(|| Mutex::new(System::new_all()));
    let mut system = probe.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    system.refresh_all();
    system.used_memory()
}
