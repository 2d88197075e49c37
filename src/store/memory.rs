//! In-memory object store backend for testing

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{ObjectMetadata, ObjectStore, StorageError, StorageResult};
use crate::job::ObjectRef;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    metadata: ObjectMetadata,
}

/// In-memory object store.
///
/// Keys are ordered so listings come back the way S3 returns them
/// (lexicographic). Cloning is cheap; all clones share the same objects.
#[derive(Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<BTreeMap<(String, String), StoredObject>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without metadata, for test setup.
    pub async fn seed(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        let mut objects = self.objects.write().await;
        objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                body: body.into(),
                metadata: ObjectMetadata::new(),
            },
        );
    }

    /// Number of stored objects across all buckets.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectRef>> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((b, k), o)| ObjectRef {
                bucket: b.clone(),
                key: k.clone(),
                size: o.body.len() as u64,
            })
            .collect())
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        let objects = self.objects.read().await;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.body.clone())
            .ok_or_else(|| StorageError::not_found(bucket, key))
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        metadata: ObjectMetadata,
    ) -> StorageResult<()> {
        let mut objects = self.objects.write().await;
        objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject { body, metadata },
        );
        Ok(())
    }

    async fn metadata(&self, bucket: &str, key: &str) -> StorageResult<ObjectMetadata> {
        let objects = self.objects.read().await;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.metadata.clone())
            .ok_or_else(|| StorageError::not_found(bucket, key))
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let mut objects = self.objects.write().await;
        objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = MemoryStore::new();
        store
            .put("b", "k", b"hello".to_vec(), ObjectMetadata::new())
            .await
            .unwrap();
        assert_eq!(store.get("b", "k").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get("b", "missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_filters_by_bucket_and_prefix() {
        let store = MemoryStore::new();
        store.seed("b1", "job/a", "x").await;
        store.seed("b1", "job/b", "xy").await;
        store.seed("b1", "other/c", "z").await;
        store.seed("b2", "job/d", "z").await;

        let refs = store.list("b1", "job/").await.unwrap();
        let keys: Vec<_> = refs.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["job/a", "job/b"]);
        assert_eq!(refs[1].size, 2);
    }

    #[tokio::test]
    async fn test_metadata_survives_put() {
        let store = MemoryStore::new();
        let mut meta = ObjectMetadata::new();
        meta.insert("linecount".to_string(), "42".to_string());
        store.put("b", "k", vec![], meta).await.unwrap();
        assert_eq!(
            store.metadata("b", "k").await.unwrap().get("linecount"),
            Some(&"42".to_string())
        );
    }

    #[tokio::test]
    async fn test_delete_removes_object() {
        let store = MemoryStore::new();
        store.seed("b", "k", "x").await;
        store.delete("b", "k").await.unwrap();
        assert!(store.is_empty().await);
    }
}
