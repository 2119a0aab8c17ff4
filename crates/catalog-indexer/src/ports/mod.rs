//! Ports (Interfaces)
//!
//! Abstract interfaces that define how the pipeline interacts with
//! external systems (object storage, embedding service, vector index,
//! catalog).
//!
//! Implementations of these traits live in the adapters crate.

mod catalog;
mod embedding;
mod storage;
mod vector_index;

pub use catalog::CatalogReader;
pub use embedding::EmbeddingBatchService;
pub use storage::{ObjectReader, ObjectStore, ObjectWriter};
pub use vector_index::VectorIndexService;

#[cfg(test)]
pub use catalog::MockCatalogReader;
#[cfg(test)]
pub use embedding::MockEmbeddingBatchService;
