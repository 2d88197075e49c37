//! S3 object store backend

use async_trait::async_trait;
use aws_sdk_s3::Client;
use tracing::debug;

use super::{ObjectMetadata, ObjectStore, StorageError, StorageResult};
use crate::job::ObjectRef;

/// Object store backed by S3.
///
/// The client is constructed once at driver start and shared; every call
/// here is a single request against the service, with retries handled by
/// the SDK's retry layer.
pub struct S3Store {
    client: Client,
}

impl S3Store {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Verify the bucket is reachable with the current credentials.
    pub async fn check_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| StorageError::connection(format!("cannot access bucket {bucket}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectRef>> {
        debug!("Listing s3://{}/{}", bucket, prefix);

        let mut refs = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(StorageError::request)?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                refs.push(ObjectRef {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                });
            }
        }

        Ok(refs)
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        debug!("Fetching s3://{}/{}", bucket, key);

        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(StorageError::request)?
                    .into_bytes();
                Ok(bytes.to_vec())
            }
            Err(err) => {
                let service = err.into_service_error();
                if service.is_no_such_key() {
                    Err(StorageError::not_found(bucket, key))
                } else {
                    Err(StorageError::request(service))
                }
            }
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        metadata: ObjectMetadata,
    ) -> StorageResult<()> {
        debug!("Writing s3://{}/{} ({} bytes)", bucket, key, body.len());

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body.into())
            .set_metadata(Some(metadata))
            .send()
            .await
            .map_err(StorageError::request)?;

        Ok(())
    }

    async fn metadata(&self, bucket: &str, key: &str) -> StorageResult<ObjectMetadata> {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.metadata().cloned().unwrap_or_default()),
            Err(err) => {
                let service = err.into_service_error();
                if service.is_not_found() {
                    Err(StorageError::not_found(bucket, key))
                } else {
                    Err(StorageError::request(service))
                }
            }
        }
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!("Deleting s3://{}/{}", bucket, key);

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(StorageError::request)?;

        Ok(())
    }
}
