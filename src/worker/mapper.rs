//! Built-in mapper handler
//!
//! Folds CSV records into per-source accumulators: records are grouped by
//! the first eight characters of column 0 and column 3 is summed per group.
//! The aggregated mapping is written as a single JSON object at
//! `{job_id}/task/mapper/{mapper_id}`.

use std::time::Instant;
use tracing::debug;

use super::{output_metadata, Aggregate};
use crate::job::{MapperRequest, TaskKey, TaskReport};
use crate::store::ObjectStore;
use crate::Result;

/// Characters of the source column used as the grouping key.
const SOURCE_KEY_WIDTH: usize = 8;

/// Zero-based CSV column holding the value to accumulate.
const VALUE_COLUMN: usize = 3;

/// Process one mapper invocation.
///
/// Records that fail to parse are counted and skipped; a parse failure
/// never fails the invocation. Any storage failure does.
pub async fn run(store: &dyn ObjectStore, request: &MapperRequest) -> Result<TaskReport> {
    let start = Instant::now();

    let mut output = Aggregate::new();
    let mut lines = 0u64;
    let mut parse_errors = 0u64;

    for key in &request.keys {
        let body = store.get(&request.bucket, key).await?;
        let text = String::from_utf8_lossy(&body);
        for line in text.lines() {
            lines += 1;
            if fold_line(&mut output, line).is_none() {
                parse_errors += 1;
                debug!("Skipping unparseable record in {}: {:?}", key, line);
            }
        }
    }

    let elapsed_secs = start.elapsed().as_secs_f64();
    let output_key = TaskKey::MapperOutput {
        mapper_id: request.mapper_id,
    }
    .key(&request.job_id);

    store
        .put(
            &request.job_bucket,
            &output_key,
            serde_json::to_vec(&output)?,
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

fn fold_line(output: &mut Aggregate, line: &str) -> Option<()> {
    let mut columns = line.split(',');
    let source = columns.next()?;
    let value: f64 = columns.nth(VALUE_COLUMN - 1)?.trim().parse().ok()?;

    let group: String = source.chars().take(SOURCE_KEY_WIDTH).collect();
    *output.entry(group).or_insert(0.0) += value;
    Some(())
}
