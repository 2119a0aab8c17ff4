//! Transform stage - streaming merge of metadata with embedding shards
//!
//! Metadata line N pairs with embedding record N, where embedding records
//! are read across shards in file-name order. Both inputs are advanced in
//! lockstep and every datapoint is written as soon as it is built, so only
//! one record of each stream is held at a time.

use std::sync::Arc;
use std::time::Instant;

use crate::domain::{
    EmbeddingRecord, MetadataRecord, PipelineError, RecordSkip, StageResult, StorageUri,
    TransformOutcome, VectorDatapoint,
};
use crate::ports::ObjectStore;

use super::streams::{discover_shards, LineStream, ShardedLineStream};

const SKIP_LOG_LIMIT: u64 = 20;

pub struct TransformStage {
    store: Arc<dyn ObjectStore>,
}

impl TransformStage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn transform(
        &self,
        metadata_uri: &StorageUri,
        embeddings_prefix: &StorageUri,
        output_uri: &StorageUri,
    ) -> StageResult<TransformOutcome> {
        for uri in [metadata_uri, embeddings_prefix, output_uri] {
            if !self.store.supports(uri) {
                return Err(PipelineError::StorageUnavailable);
            }
        }

        let started = Instant::now();
        let shards = discover_shards(self.store.as_ref(), embeddings_prefix).await?;
        if shards.is_empty() {
            tracing::warn!("No embedding shards found under {}", embeddings_prefix);
        }
        let shard_count = shards.len();

        let mut metadata = LineStream::open(self.store.as_ref(), metadata_uri).await?;
        let mut embeddings = ShardedLineStream::new(self.store.clone(), shards);
        let mut writer = self.store.create_writer(output_uri).await?;

        let mut metadata_count = 0u64;
        let mut embedding_count = 0u64;
        let mut transformed_count = 0u64;
        let mut failed_count = 0u64;

        loop {
            let Some(metadata_line) = metadata.next_line().await? else {
                break;
            };
            metadata_count += 1;

            let Some(embedding_line) = embeddings.next_line().await? else {
                break;
            };
            embedding_count += 1;

            match merge_record(&metadata_line, &embedding_line) {
                Ok(point) => {
                    writer.write_line(&serde_json::to_string(&point)?).await?;
                    transformed_count += 1;
                }
                Err(skip) => {
                    failed_count += 1;
                    if failed_count <= SKIP_LOG_LIMIT {
                        tracing::warn!(position = metadata_count, "Skipping record: {}", skip);
                    }
                }
            }
        }

        // Drain whichever side is longer so the mismatch can be reported
        metadata_count += metadata.count_remaining().await?;
        embedding_count += embeddings.count_remaining().await?;

        let bytes = writer.finish().await?;

        if failed_count > SKIP_LOG_LIMIT {
            tracing::warn!(
                "{} records skipped in total ({} logged)",
                failed_count,
                SKIP_LOG_LIMIT
            );
        }

        let outcome = TransformOutcome {
            output_uri: output_uri.clone(),
            transformed_count,
            failed_count,
            metadata_count,
            embedding_count,
            shard_count,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        if outcome.has_count_mismatch() {
            tracing::warn!(
                "⚠️ Record count mismatch: {} metadata vs {} embeddings, output truncated to the shorter stream",
                metadata_count,
                embedding_count
            );
        }

        tracing::info!(
            "🔀 Transform completed: {} datapoints ({} skipped) from {} shards, {} bytes -> {}",
            transformed_count,
            failed_count,
            shard_count,
            bytes,
            output_uri
        );

        Ok(outcome)
    }
}

fn merge_record(metadata_line: &str, embedding_line: &str) -> Result<VectorDatapoint, RecordSkip> {
    let metadata: MetadataRecord = serde_json::from_str(metadata_line)
        .map_err(|e| RecordSkip::MalformedMetadata(e.to_string()))?;
    let record: EmbeddingRecord = serde_json::from_str(embedding_line)
        .map_err(|e| RecordSkip::MalformedEmbedding(e.to_string()))?;
    VectorDatapoint::build(&metadata, record.into_values())
}
