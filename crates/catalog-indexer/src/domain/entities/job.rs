//! Embedding job handle

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::StorageUri;

/// Reference to a job submitted to the external embedding service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Service resource name (e.g. `projects/p/locations/l/batchPredictionJobs/123`)
    pub name: String,
    /// Prefix the job was asked to write into
    pub output_prefix: StorageUri,
}

impl JobHandle {
    pub fn new(name: impl Into<String>, output_prefix: StorageUri) -> Self {
        Self {
            name: name.into(),
            output_prefix,
        }
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
