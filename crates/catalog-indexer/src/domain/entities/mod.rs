//! Domain Entities

mod catalog;
mod datapoint;
mod job;
mod pipeline_result;
mod run;

pub use catalog::{CatalogItem, ContentRecord, MetadataRecord};
pub use datapoint::{EmbeddingPrediction, EmbeddingRecord, EmbeddingValues, VectorDatapoint};
pub use job::JobHandle;
pub use pipeline_result::{
    EmbeddingOutcome, ExportOutcome, PipelineResult, RunProgress, TransformOutcome,
};
pub use run::RunPaths;
