use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on bucket '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Bucket '{path}' does not contain valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Bucket '{0}' does not contain a JSON array.")]
    NotAList(PathBuf),

    #[error("Failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),
}
