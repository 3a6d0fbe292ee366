//! Remote tile store abstraction.
//!
//! The engine only ever needs two read-only operations against the bucket:
//! a metadata probe that returns the object size and a streaming read of the
//! object body. Both are keyed by the canonical remote key.
//!
//! ```text
//! StoreConnector ──connect()──► Arc<dyn TileStore>
//!                                    │
//!                                    ├── object_size(key)  (HEAD)
//!                                    └── open_object(key)  (streaming GET)
//! ```
//!
//! Connecting is separate from construction so that a client that cannot be
//! built surfaces as a job-level error on the worker, not as a panic on the
//! caller's thread.

mod memory;
mod s3;

pub use memory::MemoryTileStore;
pub use s3::{S3Config, S3TileStore, DEFAULT_BUCKET_ENDPOINT};

use std::io::Read;
use std::sync::Arc;

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Streaming object body.
pub type ObjectStream = Box<dyn Read + Send>;

/// Errors returned by a [`TileStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The object does not exist in the bucket.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// The server answered with a non-success status.
    #[error("request for {key} failed with status {status}")]
    Status { key: String, status: u16 },

    /// The request could not be completed.
    #[error("request for {key} failed: {reason}")]
    Request { key: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("request for {key} timed out after {timeout_secs}s")]
    Timeout { key: String, timeout_secs: u64 },

    /// The server did not report an object size.
    #[error("no content length reported for {key}")]
    MissingLength { key: String },

    /// Reading the object body failed part way.
    #[error("stream for {key} broke: {reason}")]
    Stream { key: String, reason: String },

    /// The HTTP client could not be created.
    #[error("failed to create store client: {0}")]
    Client(String),
}

/// Read-only access to tile objects.
///
/// Implementations must be usable from the download worker thread.
pub trait TileStore: Send + Sync {
    /// Size of the object in bytes, without transferring its body.
    fn object_size(&self, key: &str) -> StoreResult<u64>;

    /// Open a streaming read of the object body.
    fn open_object(&self, key: &str) -> StoreResult<ObjectStream>;
}

/// Creates a [`TileStore`] at the start of a job.
pub trait StoreConnector: Send + Sync {
    fn connect(&self) -> StoreResult<Arc<dyn TileStore>>;
}

impl<S: TileStore + 'static> StoreConnector for Arc<S> {
    fn connect(&self) -> StoreResult<Arc<dyn TileStore>> {
        Ok(Arc::clone(self) as Arc<dyn TileStore>)
    }
}
