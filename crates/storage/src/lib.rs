//! # Retest Storage Crate
//!
//! The storage port of the system. Every persisted collection is a named
//! [`Bucket`] holding a JSON array of records; the rest of the workspace only
//! ever talks to buckets, never to file paths.
//!
//! ## Public API
//!
//! - `BucketStore`: the two raw primitives an adapter implements (`read_raw`, `overwrite_raw`).
//! - `BucketStoreExt`: typed `read`, `overwrite` and `append_merge` on top of any store.
//! - `JsonFileStore`: pretty-printed JSON files under a data directory, written atomically.
//! - `MemoryStore`: an in-process store for tests and dry runs.
//! - `StorageError`: the specific error types that can be returned from this crate.

pub mod bucket;
pub mod error;
pub mod json_file;
pub mod memory;
pub mod store;

pub use bucket::Bucket;
pub use error::StorageError;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use store::{BucketStore, BucketStoreExt};
