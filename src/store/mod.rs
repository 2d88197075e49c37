//! Object store abstraction
//!
//! The object store is the only durable, shared resource in the system: it
//! holds the inputs, every intermediate artifact, the per-step commit
//! records, and the final result. The [`ObjectStore`] trait is the seam
//! between the orchestrator and the concrete backend; production uses
//! [`S3Store`], tests use [`MemoryStore`].

mod error;
mod memory;
mod s3;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use s3::S3Store;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::job::ObjectRef;

/// Object metadata attached at write time and readable without the body.
pub type ObjectMetadata = HashMap<String, String>;

/// Minimal object store interface the orchestrator needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List all objects in `bucket` whose keys start with `prefix`.
    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectRef>>;

    /// Fetch an object's full body.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>>;

    /// Write an object, replacing any existing one at the same key.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        metadata: ObjectMetadata,
    ) -> StorageResult<()>;

    /// Read an object's metadata without its body.
    async fn metadata(&self, bucket: &str, key: &str) -> StorageResult<ObjectMetadata>;

    /// Delete an object.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;
}
