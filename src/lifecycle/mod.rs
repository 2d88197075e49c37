//! Function lifecycle management
//!
//! Idempotent create-or-update of the mapper, reducer, and coordinator
//! functions from packaged code artifacts, plus the permission grant and
//! bucket notification that let object-creation events on the job bucket
//! invoke the coordinator. Repeated driver runs with the same job id
//! converge on the same installed state.

use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{FunctionCode, Runtime};
use aws_sdk_s3::types::{
    Event, FilterRule, FilterRuleName, LambdaFunctionConfiguration, NotificationConfiguration,
    NotificationConfigurationFilter, S3KeyFilter,
};
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::DriverConfig;
use crate::job::{JobConfig, JobInfo, JOB_INFO_FILE};

/// Environment variable naming the execution role for installed functions.
pub const ROLE_ENV_VAR: &str = "serverless_mapreduce_role";

/// Wall budget granted to every installed function.
const FUNCTION_TIMEOUT: Duration = Duration::from_secs(900);

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Execution role not configured: set the {ROLE_ENV_VAR} environment variable")]
    MissingRole,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LifecycleError {
    fn request<E: std::fmt::Display>(err: E) -> Self {
        Self::Request(err.to_string())
    }
}

/// One function to install: its remote name and the artifact behind it.
#[derive(Debug, Clone)]
pub struct FunctionDeployment {
    pub name: String,
    pub handler: String,
    pub zip: PathBuf,
    pub memory_mb: u32,
}

/// The three deployments a job needs.
#[derive(Debug, Clone)]
pub struct JobArtifacts {
    pub mapper: FunctionDeployment,
    pub reducer: FunctionDeployment,
    pub coordinator: FunctionDeployment,
}

impl JobArtifacts {
    pub fn from_config(config: &DriverConfig, job: &JobConfig) -> Self {
        let deployment = |name: String, handler: &str, zip: &Path| FunctionDeployment {
            name,
            handler: handler.to_string(),
            zip: zip.to_path_buf(),
            memory_mb: job.worker_memory_mb,
        };
        Self {
            mapper: deployment(job.mapper_function(), &job.mapper_handler, &config.mapper.zip),
            reducer: deployment(
                job.reducer_function(),
                &job.reducer_handler,
                &config.reducer.zip,
            ),
            coordinator: deployment(
                job.coordinator_function(),
                &job.coordinator_handler,
                &config.reducer_coordinator.zip,
            ),
        }
    }
}

/// Write `jobinfo.json` next to the coordinator artifact so packaging ships
/// it inside the coordinator's deployment bundle.
pub async fn stage_job_info(artifact: &Path, info: &JobInfo) -> LifecycleResult<PathBuf> {
    let dir = artifact.parent().unwrap_or_else(|| Path::new("."));
    let path = dir.join(JOB_INFO_FILE);
    tokio::fs::write(&path, serde_json::to_vec_pretty(info)?).await?;
    Ok(path)
}

/// Installs and wires the remote functions for one job.
pub struct FunctionManager {
    lambda: aws_sdk_lambda::Client,
    s3: aws_sdk_s3::Client,
    role: String,
}

impl FunctionManager {
    pub fn new(lambda: aws_sdk_lambda::Client, s3: aws_sdk_s3::Client, role: String) -> Self {
        Self { lambda, s3, role }
    }

    /// Resolve the execution role, failing before any remote call is made.
    pub fn role_from_env() -> LifecycleResult<String> {
        std::env::var(ROLE_ENV_VAR).map_err(|_| LifecycleError::MissingRole)
    }

    /// Install everything a job needs: stage the job info, deploy the three
    /// functions, and wire the coordinator to the job bucket's task prefix.
    pub async fn prepare_job(
        &self,
        job: &JobConfig,
        artifacts: &JobArtifacts,
        map_count: usize,
    ) -> LifecycleResult<()> {
        let info = JobInfo::new(job, map_count);
        let staged = stage_job_info(&artifacts.coordinator.zip, &info).await?;
        info!("Staged job info at {}", staged.display());

        self.deploy(&artifacts.mapper).await?;
        self.deploy(&artifacts.reducer).await?;
        let coordinator_arn = self.deploy(&artifacts.coordinator).await?;

        self.grant_bucket_invoke(&artifacts.coordinator.name, &job.job_bucket)
            .await?;
        self.wire_bucket_notification(&coordinator_arn, &job.job_bucket, &job.task_prefix())
            .await?;

        Ok(())
    }

    /// Ensure a function exists and points at the latest artifact.
    ///
    /// Returns the unqualified function ARN.
    pub async fn deploy(&self, deployment: &FunctionDeployment) -> LifecycleResult<String> {
        let code = tokio::fs::read(&deployment.zip).await?;

        let created = self
            .lambda
            .create_function()
            .function_name(&deployment.name)
            .code(FunctionCode::builder().zip_file(Blob::new(code.clone())).build())
            .handler(&deployment.handler)
            .role(&self.role)
            .runtime(Runtime::Providedal2023)
            .description(&deployment.name)
            .memory_size(deployment.memory_mb as i32)
            .timeout(FUNCTION_TIMEOUT.as_secs() as i32)
            .send()
            .await;

        match created {
            Ok(output) => {
                info!("Created function {}", deployment.name);
                Ok(output.function_arn().unwrap_or_default().to_string())
            }
            Err(err) => {
                let service = err.into_service_error();
                if !service.is_resource_conflict_exception() {
                    return Err(LifecycleError::request(service));
                }
                debug!("Function {} exists, updating code", deployment.name);
                self.update_code(deployment, code).await
            }
        }
    }

    async fn update_code(
        &self,
        deployment: &FunctionDeployment,
        code: Vec<u8>,
    ) -> LifecycleResult<String> {
        let output = self
            .lambda
            .update_function_code()
            .function_name(&deployment.name)
            .zip_file(Blob::new(code))
            .publish(true)
            .send()
            .await
            .map_err(|e| LifecycleError::request(e.into_service_error()))?;

        info!("Updated function {}", deployment.name);
        // Publishing returns a version-qualified ARN; the permission and
        // notification wiring must reference the unqualified function.
        Ok(strip_version_suffix(output.function_arn().unwrap_or_default()).to_string())
    }

    /// Allow the bucket to invoke `function` on object-creation events.
    pub async fn grant_bucket_invoke(&self, function: &str, bucket: &str) -> LifecycleResult<()> {
        let statement_id = rand::rng().random_range(1..=1000u32).to_string();
        self.lambda
            .add_permission()
            .function_name(function)
            .action("lambda:InvokeFunction")
            .principal("s3.amazonaws.com")
            .statement_id(statement_id)
            .source_arn(format!("arn:aws:s3:::{bucket}"))
            .send()
            .await
            .map_err(|e| LifecycleError::request(e.into_service_error()))?;
        Ok(())
    }

    /// Route object-creation events under `prefix` to the coordinator. The
    /// prefix keeps header, state, and result writes from triggering it.
    pub async fn wire_bucket_notification(
        &self,
        function_arn: &str,
        bucket: &str,
        prefix: &str,
    ) -> LifecycleResult<()> {
        let filter = NotificationConfigurationFilter::builder()
            .key(
                S3KeyFilter::builder()
                    .filter_rules(
                        FilterRule::builder()
                            .name(FilterRuleName::Prefix)
                            .value(prefix)
                            .build(),
                    )
                    .build(),
            )
            .build();

        let configuration = LambdaFunctionConfiguration::builder()
            .events(Event::from("s3:ObjectCreated:*"))
            .lambda_function_arn(function_arn)
            .filter(filter)
            .build()
            .map_err(|e| LifecycleError::InvalidConfig(e.to_string()))?;

        self.s3
            .put_bucket_notification_configuration()
            .bucket(bucket)
            .notification_configuration(
                NotificationConfiguration::builder()
                    .lambda_function_configurations(configuration)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| LifecycleError::request(e.into_service_error()))?;

        Ok(())
    }

    /// Remove an installed function.
    pub async fn delete_function(&self, name: &str) -> LifecycleResult<()> {
        self.lambda
            .delete_function()
            .function_name(name)
            .send()
            .await
            .map_err(|e| LifecycleError::request(e.into_service_error()))?;
        info!("Deleted function {}", name);
        Ok(())
    }

    /// Remove all three functions installed for a job.
    pub async fn teardown_job(&self, job: &JobConfig) -> LifecycleResult<()> {
        self.delete_function(&job.mapper_function()).await?;
        self.delete_function(&job.reducer_function()).await?;
        self.delete_function(&job.coordinator_function()).await?;
        Ok(())
    }
}

/// Drop a trailing version qualifier from a function ARN, if present.
fn strip_version_suffix(arn: &str) -> &str {
    match arn.rsplit_once(':') {
        Some((base, suffix))
            if suffix == "$LATEST" || (!suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit())) =>
        {
            base
        }
        _ => arn,
    }
}
