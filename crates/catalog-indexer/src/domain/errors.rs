//! Domain Errors
//!
//! Stage-level failures abort the remaining stages of a run. Record-level
//! problems are [`RecordSkip`]s: counted and logged, never escalated.

use thiserror::Error;

use super::value_objects::JobState;

/// Pipeline errors (batch/stage level)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// A required external client could not be built
    #[error("Service unavailable: {0} is not configured")]
    ConfigurationUnavailable(String),

    #[error("Service unavailable: no durable object store is configured")]
    StorageUnavailable,

    /// Network/timeout errors against storage, embedding or index services
    #[error("{service} error: {message}")]
    TransientExternalFailure { service: String, message: String },

    #[error("Embedding job {job} did not reach a terminal state within {waited_secs}s (last state {last_state})")]
    JobTimeout {
        job: String,
        waited_secs: u64,
        last_state: JobState,
    },

    #[error("Embedding job {job} ended in state {state}")]
    JobFailed { job: String, state: JobState },

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid storage URI: {0}")]
    InvalidUri(String),

    #[error("Invalid run id: {0}")]
    InvalidRunId(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PipelineError {
    pub fn transient<S: AsRef<str>, M: ToString>(service: S, message: M) -> Self {
        Self::TransientExternalFailure {
            service: service.as_ref().to_string(),
            message: message.to_string(),
        }
    }

    /// Whether re-invoking the same stage may succeed without operator changes
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::TransientExternalFailure { .. } | PipelineError::JobTimeout { .. }
        )
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

pub type StageResult<T> = Result<T, PipelineError>;

/// Why a single catalog item or merge record was skipped
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordSkip {
    #[error("catalog item has no id")]
    MissingId,

    #[error("catalog item {0} has no text to embed")]
    EmptyContent(String),

    #[error("metadata record is not valid JSON: {0}")]
    MalformedMetadata(String),

    #[error("embedding record is not valid JSON: {0}")]
    MalformedEmbedding(String),

    #[error("embedding record for {0} has no prediction values")]
    MissingEmbedding(String),
}
