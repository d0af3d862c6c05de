use crate::bucket::Bucket;
use crate::error::StorageError;
use crate::store::BucketStore;
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Buckets as pretty-printed JSON files under a data directory.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// reader never observes a half-written bucket.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_path(&self, bucket: &Bucket) -> PathBuf {
        self.root.join(bucket.path())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl BucketStore for JsonFileStore {
    async fn read_raw(&self, bucket: &Bucket) -> Result<Option<Value>, StorageError> {
        let path = self.file_path(bucket);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path)(e)),
        };
        if contents.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| StorageError::Json { path, source })
    }

    async fn overwrite_raw(&self, bucket: &Bucket, value: Value) -> Result<(), StorageError> {
        let path = self.file_path(bucket);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error(parent))?;
        }
        let bytes = serde_json::to_vec_pretty(&value)?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, bytes).await.map_err(io_error(&tmp))?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_error(&path))?;

        tracing::debug!(bucket = %bucket, "Bucket written.");
        Ok(())
    }
}
