//! Object Storage Port
//!
//! Durable storage addressed by `scheme://bucket/path` URIs. Reads and writes
//! are sequential so callers never hold a whole object in memory.

use async_trait::async_trait;
use tokio::io::AsyncBufRead;

use crate::domain::errors::PipelineError;
use crate::domain::value_objects::StorageUri;

/// Buffered sequential reader over one object
pub type ObjectReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Sequential, line-oriented writer for one object
///
/// The object becomes visible only after `finish` succeeds.
#[async_trait]
pub trait ObjectWriter: Send {
    /// Append one line (a trailing newline is added)
    async fn write_line(&mut self, line: &str) -> Result<(), PipelineError>;

    /// Flush and commit the object. Returns bytes written.
    async fn finish(self: Box<Self>) -> Result<u64, PipelineError>;
}

/// Storage interface used by every stage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether this store serves the URI's scheme
    fn supports(&self, uri: &StorageUri) -> bool;

    /// Open an existing object for sequential reading
    async fn open_reader(&self, uri: &StorageUri) -> Result<ObjectReader, PipelineError>;

    /// Create (or replace) an object and return a writer for it
    async fn create_writer(&self, uri: &StorageUri)
        -> Result<Box<dyn ObjectWriter>, PipelineError>;

    /// List objects under a prefix, recursively, in no particular order
    async fn list(&self, prefix: &StorageUri) -> Result<Vec<StorageUri>, PipelineError>;

    /// Whether an object exists
    async fn exists(&self, uri: &StorageUri) -> Result<bool, PipelineError>;
}
