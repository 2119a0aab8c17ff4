//! Index update stage - publish datapoints to the vector index

use std::sync::Arc;

use crate::domain::{IndexUpdateMode, PipelineError, StageResult, StorageUri};
use crate::ports::{ObjectStore, VectorIndexService};

pub struct IndexUpdateStage {
    index: Arc<dyn VectorIndexService>,
    store: Arc<dyn ObjectStore>,
}

impl IndexUpdateStage {
    pub fn new(index: Arc<dyn VectorIndexService>, store: Arc<dyn ObjectStore>) -> Self {
        Self { index, store }
    }

    /// Apply the datapoints file; returns the index's resource identifier.
    ///
    /// Complete overwrite of the same file is idempotent.
    pub async fn update_index(
        &self,
        vectors_uri: &StorageUri,
        mode: IndexUpdateMode,
    ) -> StageResult<String> {
        if !self.store.exists(vectors_uri).await? {
            return Err(PipelineError::ObjectNotFound(vectors_uri.to_string()));
        }

        tracing::info!("📇 Updating vector index from {} ({})", vectors_uri, mode);
        let resource = self.index.overwrite_or_upsert(vectors_uri, mode).await?;
        tracing::info!("📇 Vector index {} updated", resource);

        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryObjectStore, MemoryVectorIndex};

    const VECTORS: &str = "mem://b/runs/r/vectors/datapoints.jsonl";

    fn setup() -> (Arc<MemoryObjectStore>, Arc<MemoryVectorIndex>, IndexUpdateStage) {
        let store = Arc::new(MemoryObjectStore::new());
        let index = Arc::new(MemoryVectorIndex::new(store.clone(), "products"));
        let stage = IndexUpdateStage::new(index.clone(), store.clone());
        (store, index, stage)
    }

    #[tokio::test]
    async fn test_complete_overwrite_twice_is_idempotent() {
        let (store, index, stage) = setup();
        store.put(
            VECTORS,
            "{\"id\":\"p1\",\"embedding\":[1.0,1.0]}\n{\"id\":\"p2\",\"embedding\":[2.0,2.0]}\n",
        );
        let uri = StorageUri::parse(VECTORS).unwrap();

        let first = stage.update_index(&uri, IndexUpdateMode::CompleteOverwrite).await.unwrap();
        let after_first = index.snapshot();
        let second = stage.update_index(&uri, IndexUpdateMode::CompleteOverwrite).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(index.snapshot(), after_first);
        assert_eq!(after_first.len(), 2);
        assert_eq!(index.update_count(IndexUpdateMode::CompleteOverwrite), 2);
    }

    #[tokio::test]
    async fn test_overwrite_drops_points_absent_from_file_but_incremental_keeps_them() {
        let (store, index, stage) = setup();
        let uri = StorageUri::parse(VECTORS).unwrap();

        store.put(VECTORS, "{\"id\":\"old\",\"embedding\":[0.0]}\n");
        stage.update_index(&uri, IndexUpdateMode::CompleteOverwrite).await.unwrap();

        store.put(VECTORS, "{\"id\":\"new\",\"embedding\":[1.0]}\n");
        stage.update_index(&uri, IndexUpdateMode::Incremental).await.unwrap();
        assert!(index.snapshot().contains_key("old"));
        assert!(index.snapshot().contains_key("new"));

        stage.update_index(&uri, IndexUpdateMode::CompleteOverwrite).await.unwrap();
        assert!(!index.snapshot().contains_key("old"));
    }

    #[tokio::test]
    async fn test_missing_datapoints_file_is_not_found() {
        let (_, index, stage) = setup();
        let err = stage
            .update_index(&StorageUri::parse(VECTORS).unwrap(), IndexUpdateMode::Incremental)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ObjectNotFound(_)));
        assert_eq!(index.update_count(IndexUpdateMode::Incremental), 0);
    }
}
