//! Command-line interface
//!
//! Argument structures and the command router. Commands construct the AWS
//! clients once, wire up the store/invoker/lifecycle pieces, and hand off
//! to the driver.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::DriverConfig;
use crate::driver::Driver;
use crate::invoke::LambdaInvoker;
use crate::job::JobConfig;
use crate::lifecycle::{FunctionManager, JobArtifacts};
use crate::store::{ObjectStore, S3Store};

/// Run MapReduce jobs on a serverless fleet
#[derive(Parser)]
#[command(name = "nimbus")]
#[command(about = "nimbus - Serverless MapReduce over S3 and Lambda", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a job to completion and report metrics
    #[command(name = "run")]
    Run {
        /// Driver configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Job identifier; the namespace for everything the job writes
        #[arg(short, long)]
        job_id: String,

        /// Abort if no result appears within this many seconds
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },

    /// Delete a finished job's artifacts from the job bucket
    #[command(name = "cleanup")]
    Cleanup {
        /// Driver configuration file
        #[arg(short, long)]
        config: PathBuf,

        /// Job identifier to clean up
        #[arg(short, long)]
        job_id: String,

        /// Also delete the installed worker functions
        #[arg(long)]
        functions: bool,
    },
}

/// Route a parsed command to its implementation.
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            config,
            job_id,
            timeout,
        } => run_job(&config, &job_id, timeout).await,
        Commands::Cleanup {
            config,
            job_id,
            functions,
        } => cleanup_job(&config, &job_id, functions).await,
    }
}

async fn sdk_config(region: Option<&str>, read_timeout: Duration) -> aws_config::SdkConfig {
    let timeouts = aws_config::timeout::TimeoutConfig::builder()
        .read_timeout(read_timeout)
        .build();
    let mut loader = aws_config::from_env().timeout_config(timeouts);
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region.to_string()));
    }
    loader.load().await
}

async fn run_job(config_path: &Path, job_id: &str, timeout: Option<u64>) -> Result<()> {
    let config = DriverConfig::load(config_path).await?;
    let job = JobConfig::new(&config, job_id);

    // Misconfiguration is fatal before the first remote call.
    let role = FunctionManager::role_from_env()?;

    let sdk = sdk_config(job.region.as_deref(), job.invoke_timeout).await;
    let s3 = aws_sdk_s3::Client::new(&sdk);
    let lambda = aws_sdk_lambda::Client::new(&sdk);

    let store = Arc::new(S3Store::new(s3.clone()));
    store.check_bucket(&job.input_bucket).await?;
    store.check_bucket(&job.job_bucket).await?;

    let invoker = Arc::new(LambdaInvoker::new(lambda.clone(), job.connection_pool_size));
    let manager = FunctionManager::new(lambda, s3, role);
    let artifacts = JobArtifacts::from_config(&config, &job);

    let mut driver = Driver::new(job, store, invoker).with_lifecycle(manager, artifacts);
    if let Some(secs) = timeout {
        driver = driver.with_poll_timeout(Duration::from_secs(secs));
    }

    let metrics = driver.run().await?;

    info!("Mapper execution time: {:.2}s", metrics.mapper_secs);
    info!("Reducer execution time: {:.2}s", metrics.reducer_secs);
    info!(
        "Total fleet time: {:.2}s across {} mappers over {} objects",
        metrics.mapper_secs + metrics.reducer_secs,
        metrics.map_count,
        metrics.total_input_objects
    );
    info!(
        "Records folded: {} ({} skipped), wall time {:.2}s",
        metrics.total_lines, metrics.total_parse_errors, metrics.wall_secs
    );

    Ok(())
}

async fn cleanup_job(config_path: &Path, job_id: &str, functions: bool) -> Result<()> {
    let config = DriverConfig::load(config_path).await?;
    let job = JobConfig::new(&config, job_id);

    let sdk = sdk_config(job.region.as_deref(), job.invoke_timeout).await;
    let s3 = aws_sdk_s3::Client::new(&sdk);
    let store = S3Store::new(s3.clone());

    let listing = store.list(&job.job_bucket, &job.job_prefix()).await?;
    for object in &listing {
        store.delete(&job.job_bucket, &object.key).await?;
    }
    info!(
        "Deleted {} artifacts under {}/{}",
        listing.len(),
        job.job_bucket,
        job.job_prefix()
    );

    if functions {
        let lambda = aws_sdk_lambda::Client::new(&sdk);
        let role = FunctionManager::role_from_env().unwrap_or_default();
        let manager = FunctionManager::new(lambda, s3, role);
        manager.teardown_job(&job).await?;
    }

    Ok(())
}
