//! Embedding Batch Service Port
//!
//! Abstract interface for an asynchronous batch-embedding service. The
//! service is the sole source of truth for job state.

use async_trait::async_trait;

use crate::domain::entities::JobHandle;
use crate::domain::errors::PipelineError;
use crate::domain::value_objects::{JobState, StorageUri};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingBatchService: Send + Sync {
    /// Submit a content file for embedding; results are written under `output_prefix`
    async fn submit(
        &self,
        input_uri: &StorageUri,
        output_prefix: &StorageUri,
        display_name: &str,
    ) -> Result<JobHandle, PipelineError>;

    /// Current state of a job
    async fn get_state(&self, job: &JobHandle) -> Result<JobState, PipelineError>;

    /// Directory holding the job's output shards. Valid only after SUCCEEDED.
    async fn get_output_uri(&self, job: &JobHandle) -> Result<StorageUri, PipelineError>;
}
