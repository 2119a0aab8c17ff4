//! Vector datapoints and the embedding-response records they are built from

use serde::{Deserialize, Serialize};

use crate::domain::errors::RecordSkip;
use crate::domain::value_objects::{derive_restricts, CategoricalRestrict, NumericRestrict};

use super::MetadataRecord;

/// Unit record consumed by the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorDatapoint {
    pub id: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub restricts: Vec<CategoricalRestrict>,
    #[serde(default)]
    pub numeric_restricts: Vec<NumericRestrict>,
}

impl VectorDatapoint {
    /// Pair a metadata record with the embedding at the same position
    pub fn build(metadata: &MetadataRecord, embedding: Vec<f32>) -> Result<Self, RecordSkip> {
        let id = metadata.id.trim();
        if id.is_empty() {
            return Err(RecordSkip::MissingId);
        }
        if embedding.is_empty() {
            return Err(RecordSkip::MissingEmbedding(id.to_string()));
        }

        let (restricts, numeric_restricts) = derive_restricts(metadata);
        Ok(Self {
            id: id.to_string(),
            embedding,
            restricts,
            numeric_restricts,
        })
    }
}

/// One line of the embedding job's output shards
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingRecord {
    #[serde(default)]
    pub predictions: Vec<EmbeddingPrediction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingPrediction {
    #[serde(default)]
    pub embeddings: Option<EmbeddingValues>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingValues {
    #[serde(default)]
    pub values: Vec<f32>,
}

impl EmbeddingRecord {
    /// Values of the first prediction; empty when the service returned none
    pub fn into_values(self) -> Vec<f32> {
        self.predictions
            .into_iter()
            .next()
            .and_then(|p| p.embeddings)
            .map(|e| e.values)
            .unwrap_or_default()
    }
}
