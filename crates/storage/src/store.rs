use crate::bucket::Bucket;
use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::hash::Hash;

/// The raw storage port. Adapters only move whole JSON documents.
#[async_trait]
pub trait BucketStore: Send + Sync {
    /// Returns the bucket's document, or `None` when the bucket does not exist yet.
    async fn read_raw(&self, bucket: &Bucket) -> Result<Option<Value>, StorageError>;

    /// Replaces the bucket's document.
    async fn overwrite_raw(&self, bucket: &Bucket, value: Value) -> Result<(), StorageError>;
}

/// Typed access to array buckets. Implemented for every [`BucketStore`].
#[async_trait]
pub trait BucketStoreExt: BucketStore {
    /// Reads every record of the bucket. A missing bucket is empty.
    ///
    /// Elements that do not deserialize as `R` are logged and skipped so one
    /// malformed record never hides the rest of the bucket.
    async fn read<R>(&self, bucket: &Bucket) -> Result<Vec<R>, StorageError>
    where
        R: DeserializeOwned + Send,
    {
        let elements = read_elements(self, bucket).await?;
        let mut records = Vec::with_capacity(elements.len());
        for (index, element) in elements.into_iter().enumerate() {
            match serde_json::from_value(element) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(%bucket, index, error = %e, "Skipping malformed record."),
            }
        }
        Ok(records)
    }

    /// Replaces the bucket with exactly `records`.
    async fn overwrite<R>(&self, bucket: &Bucket, records: &[R]) -> Result<(), StorageError>
    where
        R: Serialize + Sync,
    {
        let value = serde_json::to_value(records)?;
        self.overwrite_raw(bucket, value).await
    }

    /// Appends the records whose key is not yet present and rewrites the bucket.
    ///
    /// Existing elements are kept as they are, including ones that no longer
    /// deserialize. Returns the number of records appended.
    async fn append_merge<R, K, F>(&self, bucket: &Bucket, records: &[R], key: F) -> Result<usize, StorageError>
    where
        R: Serialize + DeserializeOwned + Sync,
        K: Eq + Hash + Send,
        F: Fn(&R) -> K + Send + Sync,
    {
        let mut elements = read_elements(self, bucket).await?;
        let mut seen: HashSet<K> = elements
            .iter()
            .filter_map(|e| R::deserialize(e).ok())
            .map(|r| key(&r))
            .collect();

        let mut appended = 0;
        for record in records {
            if seen.insert(key(record)) {
                elements.push(serde_json::to_value(record)?);
                appended += 1;
            }
        }

        if appended > 0 {
            self.overwrite_raw(bucket, Value::Array(elements)).await?;
        }
        Ok(appended)
    }
}

impl<S: BucketStore + ?Sized> BucketStoreExt for S {}

async fn read_elements<S: BucketStore + ?Sized>(store: &S, bucket: &Bucket) -> Result<Vec<Value>, StorageError> {
    match store.read_raw(bucket).await? {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(elements)) => Ok(elements),
        Some(_) => Err(StorageError::NotAList(bucket.path())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use core_types::OrderSide;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u32,
        name: String,
    }

    fn row(id: u32, name: &str) -> Row {
        Row { id, name: name.to_string() }
    }

    #[tokio::test]
    async fn missing_bucket_reads_as_empty() {
        let store = MemoryStore::new();
        let rows: Vec<Row> = store.read(&Bucket::History("SBER".into())).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn malformed_elements_are_skipped() {
        let bucket = Bucket::Requests(OrderSide::Buy);
        let store = MemoryStore::new();
        store
            .overwrite_raw(&bucket, json!([{"id": 1, "name": "a"}, {"id": "bad"}, {"id": 2, "name": "b"}]))
            .await
            .unwrap();
        let rows: Vec<Row> = store.read(&bucket).await.unwrap();
        assert_eq!(rows, vec![row(1, "a"), row(2, "b")]);
    }

    #[tokio::test]
    async fn append_merge_keeps_existing_and_skips_known_keys() {
        let bucket = Bucket::Requests(OrderSide::Sell);
        let store = MemoryStore::new();
        store
            .overwrite_raw(&bucket, json!([{"id": 1, "name": "first"}, {"legacy": true}]))
            .await
            .unwrap();

        let added = store
            .append_merge(&bucket, &[row(1, "changed"), row(2, "new"), row(2, "dup")], |r| r.id)
            .await
            .unwrap();
        assert_eq!(added, 1);

        let raw = store.read_raw(&bucket).await.unwrap().unwrap();
        assert_eq!(
            raw,
            json!([{"id": 1, "name": "first"}, {"legacy": true}, {"id": 2, "name": "new"}])
        );

        let again = store.append_merge(&bucket, &[row(2, "new")], |r| r.id).await.unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn non_array_bucket_is_an_error() {
        let bucket = Bucket::History("X".into());
        let store = MemoryStore::new();
        store.overwrite_raw(&bucket, json!({"oops": 1})).await.unwrap();
        let result: Result<Vec<Row>, _> = store.read(&bucket).await;
        assert!(matches!(result, Err(StorageError::NotAList(_))));
    }
}
