use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::store::{SnapshotStore, StoreError, StoreResult};

/// In-memory store used by the test suites and the operator's unit tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn put(&self, bucket: &str, object: &str, data: Vec<u8>) -> StoreResult<()> {
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(object.to_string(), data);
        Ok(())
    }

    async fn get(&self, bucket: &str, object: &str) -> StoreResult<Vec<u8>> {
        let buckets = self.buckets.lock().await;
        buckets
            .get(bucket)
            .and_then(|b| b.get(object))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            })
    }

    async fn remove(&self, bucket: &str, object: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.lock().await;
        let removed = buckets.get_mut(bucket).and_then(|b| b.remove(object));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            }),
        }
    }

    async fn ensure_bucket(&self, bucket: &str) -> StoreResult<()> {
        let mut buckets = self.buckets.lock().await;
        buckets.entry(bucket.to_string()).or_default();
        Ok(())
    }

    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        let buckets = self.buckets.lock().await;
        let mut names: Vec<String> = buckets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
