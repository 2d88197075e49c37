//! Driver configuration
//!
//! The driver reads a single JSON configuration file describing the input
//! selector, the job bucket, the worker sizing knobs, and the three
//! function artifacts. Legacy key spellings (`lambda_read_timeout`,
//! `boto_max_connections`) are accepted as aliases so existing
//! `driverconfig.json` files keep loading.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One worker function's artifacts: where its source lives, the entry point
/// inside the deployed package, and the packaged zip to upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: PathBuf,
    pub handler: String,
    pub zip: PathBuf,
}

/// The driver's configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Bucket holding the input objects.
    pub bucket: String,
    /// Key prefix selecting the input objects.
    pub prefix: String,
    /// Scratch/output bucket the job writes under `{job_id}/`.
    #[serde(rename = "jobBucket")]
    pub job_bucket: String,
    #[serde(default)]
    pub region: Option<String>,
    /// Worker memory in MB; also drives batch sizing.
    #[serde(rename = "lambdaMemory", default = "default_lambda_memory")]
    pub lambda_memory_mb: u32,
    /// Cap on simultaneous mapper invocations.
    #[serde(rename = "concurrentLambdas", default = "default_concurrent_lambdas")]
    pub concurrent_lambdas: usize,
    /// Read timeout for synchronous invocations, in seconds. Must cover a
    /// worker's full wall budget.
    #[serde(
        rename = "lambdaReadTimeout",
        alias = "lambda_read_timeout",
        default = "default_read_timeout"
    )]
    pub lambda_read_timeout_s: u64,
    /// Connection pool size for the invocation client.
    #[serde(
        rename = "maxConnections",
        alias = "boto_max_connections",
        default = "default_max_connections"
    )]
    pub max_connections: usize,
    pub mapper: FunctionSpec,
    pub reducer: FunctionSpec,
    #[serde(rename = "reducerCoordinator")]
    pub reducer_coordinator: FunctionSpec,
}

fn default_lambda_memory() -> u32 {
    1024
}

fn default_concurrent_lambdas() -> usize {
    100
}

fn default_read_timeout() -> u64 {
    300
}

fn default_max_connections() -> usize {
    50
}

impl DriverConfig {
    /// Load and validate a configuration file.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read driver config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("invalid driver config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid driver config {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            bail!("bucket must not be empty");
        }
        if self.job_bucket.is_empty() {
            bail!("jobBucket must not be empty");
        }
        if self.lambda_memory_mb == 0 {
            bail!("lambdaMemory must be positive");
        }
        if self.concurrent_lambdas == 0 {
            bail!("concurrentLambdas must be positive");
        }
        Ok(())
    }
}
