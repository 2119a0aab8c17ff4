//! Object storage adapters

mod fs;
mod gcs;

use std::sync::Arc;

use async_trait::async_trait;

use catalog_indexer::{ObjectReader, ObjectStore, ObjectWriter, PipelineError, StorageUri};

pub use fs::FsObjectStore;
pub use gcs::GcsObjectStore;

/// Dispatches each call to the first backend that supports the URI's scheme
#[derive(Default)]
pub struct RoutingObjectStore {
    backends: Vec<Arc<dyn ObjectStore>>,
}

impl RoutingObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: Arc<dyn ObjectStore>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    fn backend(&self, uri: &StorageUri) -> Result<&Arc<dyn ObjectStore>, PipelineError> {
        self.backends
            .iter()
            .find(|b| b.supports(uri))
            .ok_or(PipelineError::StorageUnavailable)
    }
}

#[async_trait]
impl ObjectStore for RoutingObjectStore {
    fn supports(&self, uri: &StorageUri) -> bool {
        self.backends.iter().any(|b| b.supports(uri))
    }

    async fn open_reader(&self, uri: &StorageUri) -> Result<ObjectReader, PipelineError> {
        self.backend(uri)?.open_reader(uri).await
    }

    async fn create_writer(
        &self,
        uri: &StorageUri,
    ) -> Result<Box<dyn ObjectWriter>, PipelineError> {
        self.backend(uri)?.create_writer(uri).await
    }

    async fn list(&self, prefix: &StorageUri) -> Result<Vec<StorageUri>, PipelineError> {
        self.backend(prefix)?.list(prefix).await
    }

    async fn exists(&self, uri: &StorageUri) -> Result<bool, PipelineError> {
        self.backend(uri)?.exists(uri).await
    }
}
