use crate::bucket::Bucket;
use crate::error::StorageError;
use crate::store::BucketStore;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Buckets kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<Bucket, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the buckets written so far.
    pub fn buckets(&self) -> Vec<Bucket> {
        let guard = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        guard.keys().cloned().collect()
    }
}

#[async_trait]
impl BucketStore for MemoryStore {
    async fn read_raw(&self, bucket: &Bucket) -> Result<Option<Value>, StorageError> {
        let guard = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.get(bucket).cloned())
    }

    async fn overwrite_raw(&self, bucket: &Bucket, value: Value) -> Result<(), StorageError> {
        let mut guard = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(bucket.clone(), value);
        Ok(())
    }
}
