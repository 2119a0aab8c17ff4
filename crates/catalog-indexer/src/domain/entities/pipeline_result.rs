//! Stage outcomes and the final Pipeline Result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::PipelineError;
use crate::domain::value_objects::{JobState, PipelineStage, RunId, StorageUri};

/// Export stage output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub content_uri: StorageUri,
    pub metadata_uri: StorageUri,
    pub item_count: u64,
    pub failed_count: u64,
    pub duration_ms: u64,
}

/// Transform stage output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOutcome {
    pub output_uri: StorageUri,
    pub transformed_count: u64,
    pub failed_count: u64,
    pub metadata_count: u64,
    pub embedding_count: u64,
    pub shard_count: usize,
    pub duration_ms: u64,
}

impl TransformOutcome {
    pub fn has_count_mismatch(&self) -> bool {
        self.metadata_count != self.embedding_count
    }
}

/// Embedding stage output, as seen at the time it was checked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingOutcome {
    pub job_name: String,
    pub state: JobState,
    /// Shard location, known once the job has succeeded
    pub output_uri: Option<StorageUri>,
}

/// Final record of one run. Built once at completion, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: RunId,
    pub success: bool,
    pub final_stage: PipelineStage,
    pub failed_stage: Option<PipelineStage>,
    pub error_message: Option<String>,
    pub content_uri: Option<StorageUri>,
    pub metadata_uri: Option<StorageUri>,
    pub embeddings_uri: Option<StorageUri>,
    pub vectors_uri: Option<StorageUri>,
    pub index_resource_id: Option<String>,
    pub exported_count: Option<u64>,
    pub export_failed_count: Option<u64>,
    pub transformed_count: Option<u64>,
    pub transform_failed_count: Option<u64>,
    pub job_name: Option<String>,
    pub job_state: Option<JobState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Partial progress accumulated while a run executes
#[derive(Debug, Clone)]
pub struct RunProgress {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub export: Option<ExportOutcome>,
    pub job_name: Option<String>,
    pub job_state: Option<JobState>,
    pub embeddings_uri: Option<StorageUri>,
    pub transform: Option<TransformOutcome>,
    pub index_resource_id: Option<String>,
}

impl RunProgress {
    pub fn start(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            export: None,
            job_name: None,
            job_state: None,
            embeddings_uri: None,
            transform: None,
            index_resource_id: None,
        }
    }

    /// Seal the run. `failed_stage` is set only when `error` is present.
    pub fn finish(
        self,
        final_stage: PipelineStage,
        failed_stage: Option<PipelineStage>,
        error: Option<&PipelineError>,
    ) -> PipelineResult {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - self.started_at).num_milliseconds().max(0) as u64;
        let success = error.is_none() && final_stage == PipelineStage::Done;

        PipelineResult {
            run_id: self.run_id,
            success,
            final_stage,
            failed_stage: if success { None } else { failed_stage },
            error_message: error.map(|e| e.to_string()),
            content_uri: self.export.as_ref().map(|e| e.content_uri.clone()),
            metadata_uri: self.export.as_ref().map(|e| e.metadata_uri.clone()),
            exported_count: self.export.as_ref().map(|e| e.item_count),
            export_failed_count: self.export.as_ref().map(|e| e.failed_count),
            embeddings_uri: self.embeddings_uri,
            vectors_uri: self.transform.as_ref().map(|t| t.output_uri.clone()),
            transformed_count: self.transform.as_ref().map(|t| t.transformed_count),
            transform_failed_count: self.transform.as_ref().map(|t| t.failed_count),
            index_resource_id: self.index_resource_id,
            job_name: self.job_name,
            job_state: self.job_state,
            started_at: self.started_at,
            finished_at,
            duration_ms,
        }
    }
}
