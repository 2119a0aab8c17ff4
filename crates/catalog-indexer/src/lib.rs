//! Catalog Indexer Library
//!
//! Batch pipeline that turns a product catalog into vector index datapoints:
//! export, batch embedding, streaming merge, index update.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain/`): Pure pipeline types and logic
//!   - `entities/`: Records flowing between stages (CatalogItem, VectorDatapoint, PipelineResult)
//!   - `value_objects/`: Immutable value types (StorageUri, RunId, JobState, RestrictField)
//!   - `errors/`: Stage-level and record-level error types
//!
//! - **Ports** (`ports/`): Abstract interfaces (traits) for object storage,
//!   the batch embedding service, the vector index and the catalog
//!
//! - **Application** (`application/`): The four stages, the orchestrator and
//!   the scheduler
//!
//! Adapters for real services live in `catalog-indexer-adapters`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use catalog_indexer::{PipelineClients, PipelineConfig, PipelineOrchestrator, RunId};
//!
//! let orchestrator = PipelineOrchestrator::new(clients, PipelineConfig::new(base_uri));
//! let result = orchestrator.run(RunId::generate()).await;
//! ```

pub mod application;
pub mod domain;
pub mod ports;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use application::{
    maybe_start_scheduler, PipelineClients, PipelineConfig, PipelineOrchestrator,
    PipelineScheduler, SchedulerConfig,
};
pub use domain::{
    CatalogItem, EmbeddingOutcome, ExportOutcome, IndexUpdateMode, JobHandle, JobState,
    PipelineError, PipelineResult, PipelineStage, RecordSkip, RunId, RunPaths, StageResult,
    StorageUri, TransformOutcome, VectorDatapoint,
};
pub use ports::{
    CatalogReader, EmbeddingBatchService, ObjectReader, ObjectStore, ObjectWriter,
    VectorIndexService,
};
