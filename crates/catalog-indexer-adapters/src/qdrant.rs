//! Qdrant vector index adapter
//!
//! Applies a datapoints file to one collection. The whole file is checked
//! first (every line parses, one embedding dimension) so a bad file never
//! costs the live collection. Complete overwrite then drops and recreates the
//! collection; incremental mode upserts by id. Points are read line by line
//! and sent in fixed-size batches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, CreateCollectionBuilder, Distance, ListValue, PointId, PointStruct,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use uuid::Uuid;

use catalog_indexer::{
    IndexUpdateMode, ObjectStore, PipelineError, StorageUri, VectorDatapoint, VectorIndexService,
};

const SERVICE: &str = "qdrant";
const DEFAULT_BATCH_SIZE: usize = 256;
/// Payload key holding the catalog id (point ids may be hashed)
const ID_PAYLOAD_KEY: &str = "product_id";

fn qdrant_error(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::transient(SERVICE, e)
}

fn read_error(e: std::io::Error) -> PipelineError {
    PipelineError::transient("object storage", e)
}

/// What a datapoints file holds, known before anything is written
#[derive(Debug, PartialEq)]
struct DatapointsSummary {
    count: usize,
    dimension: Option<usize>,
}

/// Read a whole datapoints file, failing on the first malformed line or on
/// an embedding whose length differs from the first one
async fn validate_datapoints<R>(reader: R) -> Result<DatapointsSummary, PipelineError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = DatapointsSummary {
        count: 0,
        dimension: None,
    };
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.map_err(read_error)? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let point: VectorDatapoint = serde_json::from_str(&line)
            .map_err(|e| PipelineError::Serialization(format!("datapoint line {}: {}", line_no, e)))?;

        let len = point.embedding.len();
        match summary.dimension {
            _ if len == 0 => {
                return Err(PipelineError::Serialization(format!(
                    "datapoint {} on line {} has an empty embedding",
                    point.id, line_no
                )));
            }
            Some(dimension) if dimension != len => {
                return Err(PipelineError::Serialization(format!(
                    "datapoint {} on line {} has {} dims, expected {}",
                    point.id, line_no, len, dimension
                )));
            }
            _ => summary.dimension = Some(len),
        }
        summary.count += 1;
    }
    Ok(summary)
}

/// Qdrant connection configuration
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub timeout_secs: u64,
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            collection: collection.into(),
            timeout_secs: 30,
        }
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }
}

pub struct QdrantVectorIndex {
    client: Qdrant,
    store: Arc<dyn ObjectStore>,
    collection: String,
    batch_size: usize,
}

impl QdrantVectorIndex {
    pub fn new(config: QdrantConfig, store: Arc<dyn ObjectStore>) -> Result<Self, PipelineError> {
        let mut builder = Qdrant::from_url(&config.url);
        if let Some(api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }
        let client = builder
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(qdrant_error)?;

        tracing::info!("🌊 Connected to Qdrant collection {}", config.collection);

        Ok(Self {
            client,
            store,
            collection: config.collection,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    async fn create_collection(&self, dimension: usize) -> Result<(), PipelineError> {
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine)),
            )
            .await
            .map_err(qdrant_error)?;
        tracing::info!("✨ Created collection {} ({} dims)", self.collection, dimension);
        Ok(())
    }

    async fn upsert(&self, points: Vec<PointStruct>) -> Result<(), PipelineError> {
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(qdrant_error)?;
        Ok(())
    }
}

/// Numeric ids are used directly; anything else maps to a stable UUIDv5
fn point_id(id: &str) -> PointId {
    match id.parse::<u64>() {
        Ok(num) => PointId::from(num),
        Err(_) => PointId::from(Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string()),
    }
}

fn payload(point: &VectorDatapoint) -> HashMap<String, QdrantValue> {
    let mut payload = HashMap::new();
    payload.insert(ID_PAYLOAD_KEY.to_string(), QdrantValue::from(point.id.clone()));

    for restrict in &point.restricts {
        let values = restrict
            .allow
            .iter()
            .map(|v| QdrantValue::from(v.clone()))
            .collect();
        payload.insert(
            restrict.namespace.clone(),
            QdrantValue {
                kind: Some(Kind::ListValue(ListValue { values })),
            },
        );
    }
    for restrict in &point.numeric_restricts {
        payload.insert(restrict.namespace.clone(), QdrantValue::from(restrict.value_float));
    }
    payload
}

fn to_point(point: VectorDatapoint) -> PointStruct {
    let payload = payload(&point);
    PointStruct::new(point_id(&point.id), point.embedding, payload)
}

#[async_trait]
impl VectorIndexService for QdrantVectorIndex {
    async fn overwrite_or_upsert(
        &self,
        datapoints_uri: &StorageUri,
        mode: IndexUpdateMode,
    ) -> Result<String, PipelineError> {
        let summary = validate_datapoints(self.store.open_reader(datapoints_uri).await?).await?;

        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(qdrant_error)?;

        if mode.is_complete_overwrite() && exists {
            self.client
                .delete_collection(&self.collection)
                .await
                .map_err(qdrant_error)?;
            tracing::info!("🗑️ Dropped collection {} for complete overwrite", self.collection);
        }
        if let Some(dimension) = summary.dimension {
            if mode.is_complete_overwrite() || !exists {
                self.create_collection(dimension).await?;
            }
        }

        let mut lines = self.store.open_reader(datapoints_uri).await?.lines();
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut total = 0usize;

        while let Some(line) = lines.next_line().await.map_err(read_error)? {
            if line.trim().is_empty() {
                continue;
            }
            let point: VectorDatapoint = serde_json::from_str(&line)?;

            batch.push(to_point(point));
            if batch.len() >= self.batch_size {
                total += batch.len();
                self.upsert(std::mem::take(&mut batch)).await?;
            }
        }
        if !batch.is_empty() {
            total += batch.len();
            self.upsert(batch).await?;
        }

        if total == 0 {
            tracing::warn!("No datapoints in {}; collection {} left empty", datapoints_uri, self.collection);
        }
        tracing::info!("📇 Upserted {} points into {} ({})", total, self.collection, mode);

        Ok(format!("collections/{}", self.collection))
    }
}
