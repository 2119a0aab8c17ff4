//! Vector Index Service Port

use async_trait::async_trait;

use crate::domain::errors::PipelineError;
use crate::domain::value_objects::{IndexUpdateMode, StorageUri};

/// External nearest-neighbor index fed from a datapoints file
#[async_trait]
pub trait VectorIndexService: Send + Sync {
    /// Apply the datapoints at `datapoints_uri`. Returns the index resource id.
    ///
    /// Concurrent complete overwrites are not fenced; the last one to be
    /// confirmed by the service wins.
    async fn overwrite_or_upsert(
        &self,
        datapoints_uri: &StorageUri,
        mode: IndexUpdateMode,
    ) -> Result<String, PipelineError>;
}
