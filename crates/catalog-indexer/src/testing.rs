//! In-memory port implementations
//!
//! Used by this crate's tests and, through the `testing` feature, by
//! downstream crates that need a working pipeline without external services.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::AsyncBufReadExt;

use crate::domain::{
    CatalogItem, IndexUpdateMode, JobHandle, JobState, PipelineError,
    StorageUri, VectorDatapoint,
};
use crate::ports::{
    CatalogReader, EmbeddingBatchService, ObjectReader, ObjectStore, ObjectWriter,
    VectorIndexService,
};

/// Object store keeping every object in a map, keyed by URI string
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, uri: &str, content: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(uri.to_string(), content.as_bytes().to_vec());
    }

    pub fn get(&self, uri: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(uri)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Non-blank lines of an object
    pub fn lines(&self, uri: &str) -> Vec<String> {
        self.get(uri)
            .map(|content| {
                content
                    .lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

struct MemoryWriter {
    uri: String,
    buffer: Vec<u8>,
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

#[async_trait]
impl ObjectWriter for MemoryWriter {
    async fn write_line(&mut self, line: &str) -> Result<(), PipelineError> {
        self.buffer.extend_from_slice(line.as_bytes());
        self.buffer.push(b'\n');
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<u64, PipelineError> {
        let len = self.buffer.len() as u64;
        self.objects.lock().unwrap().insert(self.uri, self.buffer);
        Ok(len)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn supports(&self, _uri: &StorageUri) -> bool {
        true
    }

    async fn open_reader(&self, uri: &StorageUri) -> Result<ObjectReader, PipelineError> {
        let bytes = self
            .objects
            .lock()
            .unwrap()
            .get(&uri.to_string())
            .cloned()
            .ok_or_else(|| PipelineError::ObjectNotFound(uri.to_string()))?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    async fn create_writer(
        &self,
        uri: &StorageUri,
    ) -> Result<Box<dyn ObjectWriter>, PipelineError> {
        Ok(Box::new(MemoryWriter {
            uri: uri.to_string(),
            buffer: Vec::new(),
            objects: self.objects.clone(),
        }))
    }

    async fn list(&self, prefix: &StorageUri) -> Result<Vec<StorageUri>, PipelineError> {
        let prefix = prefix.as_prefix().to_string();
        let objects = self.objects.lock().unwrap();
        objects
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .map(|k| StorageUri::parse(k))
            .collect()
    }

    async fn exists(&self, uri: &StorageUri) -> Result<bool, PipelineError> {
        Ok(self.objects.lock().unwrap().contains_key(&uri.to_string()))
    }
}

/// Catalog backed by a fixed list, paged in list order
pub struct StaticCatalog {
    items: Vec<CatalogItem>,
}

impl StaticCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl CatalogReader for StaticCatalog {
    async fn paged_query(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<CatalogItem>, PipelineError> {
        let start = page as usize * page_size as usize;
        Ok(self
            .items
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect())
    }
}

/// Embedding service that "embeds" line `i` of the content file as
/// `[i+1, i+1]` and writes the results as shards into the output prefix
pub struct FakeEmbeddingService {
    store: Arc<MemoryObjectStore>,
    shard_size: usize,
    running_polls: usize,
    final_state: JobState,
    polls: AtomicUsize,
}

impl FakeEmbeddingService {
    pub fn new(store: Arc<MemoryObjectStore>) -> Self {
        Self {
            store,
            shard_size: 2,
            running_polls: 1,
            final_state: JobState::Succeeded,
            polls: AtomicUsize::new(0),
        }
    }

    pub fn with_shard_size(mut self, shard_size: usize) -> Self {
        self.shard_size = shard_size.max(1);
        self
    }

    /// Number of RUNNING answers before the final state is reported
    pub fn with_running_polls(mut self, running_polls: usize) -> Self {
        self.running_polls = running_polls;
        self
    }

    pub fn with_final_state(mut self, state: JobState) -> Self {
        self.final_state = state;
        self
    }

    /// Store the shards are written to
    pub fn store(&self) -> Arc<MemoryObjectStore> {
        self.store.clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    fn output_dir(prefix: &StorageUri) -> StorageUri {
        prefix.as_prefix().join("prediction-model-fake/")
    }
}

#[async_trait]
impl EmbeddingBatchService for FakeEmbeddingService {
    async fn submit(
        &self,
        input_uri: &StorageUri,
        output_prefix: &StorageUri,
        display_name: &str,
    ) -> Result<JobHandle, PipelineError> {
        let mut lines = self.store.open_reader(input_uri).await?.lines();
        let dir = Self::output_dir(output_prefix);
        let mut index = 0usize;
        let mut writer: Option<Box<dyn ObjectWriter>> = None;

        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| PipelineError::transient("memory store", e))?
        {
            if line.trim().is_empty() {
                continue;
            }
            if index % self.shard_size == 0 {
                if let Some(w) = writer.take() {
                    w.finish().await?;
                }
                let shard = dir.join(&format!("predictions_{:05}.jsonl", index / self.shard_size + 1));
                writer = Some(self.store.create_writer(&shard).await?);
            }
            let value = (index + 1) as f32;
            let record = serde_json::json!({
                "instance": serde_json::from_str::<serde_json::Value>(&line)?,
                "predictions": [{ "embeddings": { "values": [value, value] } }],
            });
            if let Some(w) = writer.as_mut() {
                w.write_line(&record.to_string()).await?;
            }
            index += 1;
        }
        if let Some(w) = writer.take() {
            w.finish().await?;
        }

        Ok(JobHandle::new(
            format!("batchPredictionJobs/{}", display_name),
            output_prefix.clone(),
        ))
    }

    async fn get_state(&self, _job: &JobHandle) -> Result<JobState, PipelineError> {
        let seen = self.polls.fetch_add(1, Ordering::SeqCst);
        if seen < self.running_polls {
            Ok(JobState::Running)
        } else {
            Ok(self.final_state)
        }
    }

    async fn get_output_uri(&self, job: &JobHandle) -> Result<StorageUri, PipelineError> {
        Ok(Self::output_dir(&job.output_prefix))
    }
}

/// Vector index holding the applied datapoints in memory
pub struct MemoryVectorIndex {
    store: Arc<MemoryObjectStore>,
    name: String,
    points: Mutex<BTreeMap<String, VectorDatapoint>>,
    updates: Mutex<HashMap<IndexUpdateMode, usize>>,
}

impl MemoryVectorIndex {
    pub fn new(store: Arc<MemoryObjectStore>, name: &str) -> Self {
        Self {
            store,
            name: name.to_string(),
            points: Mutex::new(BTreeMap::new()),
            updates: Mutex::new(HashMap::new()),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, VectorDatapoint> {
        self.points.lock().unwrap().clone()
    }

    pub fn update_count(&self, mode: IndexUpdateMode) -> usize {
        self.updates.lock().unwrap().get(&mode).copied().unwrap_or(0)
    }
}

#[async_trait]
impl VectorIndexService for MemoryVectorIndex {
    async fn overwrite_or_upsert(
        &self,
        datapoints_uri: &StorageUri,
        mode: IndexUpdateMode,
    ) -> Result<String, PipelineError> {
        let mut staged = BTreeMap::new();
        let mut lines = self.store.open_reader(datapoints_uri).await?.lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| PipelineError::transient("memory store", e))?
        {
            if line.trim().is_empty() {
                continue;
            }
            let point: VectorDatapoint = serde_json::from_str(&line)?;
            staged.insert(point.id.clone(), point);
        }

        let mut points = self.points.lock().unwrap();
        if mode.is_complete_overwrite() {
            *points = staged;
        } else {
            points.extend(staged);
        }
        *self.updates.lock().unwrap().entry(mode).or_insert(0) += 1;

        Ok(format!("indexes/{}", self.name))
    }
}
