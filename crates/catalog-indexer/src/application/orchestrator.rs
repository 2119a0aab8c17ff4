//! Pipeline Orchestrator - sequences the four stages for one run
//!
//! A full run walks `NOT_STARTED → EXPORTING → EMBEDDING_SUBMITTED →
//! EMBEDDING_POLLING → TRANSFORMING → INDEX_UPDATING → DONE`, stopping at
//! the first stage-level failure. The single-stage entry points re-derive
//! every path from the run id, so a failed run can be resumed at any stage.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;

use crate::domain::{
    EmbeddingOutcome, ExportOutcome, IndexUpdateMode, JobHandle, JobState, PipelineError,
    PipelineResult, RunId, RunPaths, RunProgress, StageResult, StageTracker,
    StorageUri, TransformOutcome,
};
use crate::ports::{CatalogReader, EmbeddingBatchService, ObjectStore, VectorIndexService};

use super::config::PipelineConfig;
use super::embedding_job::EmbeddingJobStage;
use super::export::ExportStage;
use super::index_update::IndexUpdateStage;
use super::transform::TransformStage;

/// External clients the stages depend on. `None` means not configured.
#[derive(Clone, Default)]
pub struct PipelineClients {
    pub catalog: Option<Arc<dyn CatalogReader>>,
    pub store: Option<Arc<dyn ObjectStore>>,
    pub embedding: Option<Arc<dyn EmbeddingBatchService>>,
    pub index: Option<Arc<dyn VectorIndexService>>,
}

impl PipelineClients {
    /// Names of the clients that are missing
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.catalog.is_none() {
            missing.push("catalog reader");
        }
        if self.store.is_none() {
            missing.push("object store");
        }
        if self.embedding.is_none() {
            missing.push("embedding service");
        }
        if self.index.is_none() {
            missing.push("vector index");
        }
        missing
    }
}

pub struct PipelineOrchestrator {
    clients: PipelineClients,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    pub fn new(clients: PipelineClients, config: PipelineConfig) -> Self {
        Self { clients, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// True only when every stage's external client is configured
    pub fn is_available(&self) -> bool {
        self.clients.missing().is_empty()
    }

    pub fn paths(&self, run_id: &RunId) -> RunPaths {
        RunPaths::derive(&self.config.base_uri, run_id)
    }

    /// Run all four stages on the caller's task.
    ///
    /// Never fails: stage errors end up in the returned result, which is
    /// also persisted to the run's record path.
    #[tracing::instrument(skip_all, fields(run_id = %run_id))]
    pub async fn run(&self, run_id: RunId) -> PipelineResult {
        let paths = self.paths(&run_id);
        let mut tracker = StageTracker::new();
        let mut progress = RunProgress::start(run_id);

        tracing::info!("🚀 Pipeline run started under {}", self.config.base_uri);

        let result = match self.execute(&paths, &mut tracker, &mut progress).await {
            Ok(()) => progress.finish(tracker.current(), None, None),
            Err(err) => {
                let failed_stage = tracker.last_active();
                tracker.fail();
                tracing::error!(
                    stage = ?failed_stage,
                    retryable = err.is_retryable(),
                    "❌ Pipeline run failed: {}",
                    err
                );
                progress.finish(tracker.current(), failed_stage, Some(&err))
            }
        };

        if result.success {
            tracing::info!(
                "✅ Pipeline run completed in {}ms: {} exported, {} datapoints",
                result.duration_ms,
                result.exported_count.unwrap_or(0),
                result.transformed_count.unwrap_or(0)
            );
        }

        self.persist_result(&paths, &result).await;
        result
    }

    /// Dispatch the same sequential run onto a background task.
    ///
    /// Dropping the handle does not stop the run. An already-submitted
    /// embedding job keeps running even if the task is aborted.
    pub fn spawn_run(self: &Arc<Self>, run_id: RunId) -> JoinHandle<PipelineResult> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.run(run_id).await })
    }

    async fn execute(
        &self,
        paths: &RunPaths,
        tracker: &mut StageTracker,
        progress: &mut RunProgress,
    ) -> StageResult<()> {
        let store = self.store()?;
        let catalog = self.catalog()?;
        let embedding = self.embedding()?;
        let index = self.index()?;

        tracker.advance();
        let export = ExportStage::new(catalog, store.clone())
            .export(&paths.content_uri, &paths.metadata_uri, self.config.page_size)
            .await?;
        progress.export = Some(export);

        tracker.advance();
        let stage = EmbeddingJobStage::new(embedding);
        let job = stage
            .submit(&paths.content_uri, &paths.embeddings_prefix, &job_display_name(&paths.run_id))
            .await?;
        progress.job_name = Some(job.name.clone());

        tracker.advance();
        let state = match stage
            .wait_for_completion(&job, self.config.poll_interval, self.config.job_timeout)
            .await
        {
            Ok(state) => state,
            Err(err) => {
                if let PipelineError::JobTimeout { last_state, .. } = &err {
                    progress.job_state = Some(*last_state);
                }
                return Err(err);
            }
        };
        progress.job_state = Some(state);
        ensure_succeeded(&job, state)?;
        let embeddings_uri = stage.output_uri(&job).await?;
        progress.embeddings_uri = Some(embeddings_uri.clone());

        tracker.advance();
        let transform = TransformStage::new(store.clone())
            .transform(&paths.metadata_uri, &embeddings_uri, &paths.vectors_uri)
            .await?;
        progress.transform = Some(transform);

        tracker.advance();
        let resource = IndexUpdateStage::new(index, store)
            .update_index(&paths.vectors_uri, self.config.index_mode)
            .await?;
        progress.index_resource_id = Some(resource);

        tracker.advance();
        Ok(())
    }

    /// Re-run only the export for `run_id`
    #[tracing::instrument(skip_all, fields(run_id = %run_id))]
    pub async fn export_only(&self, run_id: &RunId) -> StageResult<ExportOutcome> {
        let paths = self.paths(run_id);
        ExportStage::new(self.catalog()?, self.store()?)
            .export(&paths.content_uri, &paths.metadata_uri, self.config.page_size)
            .await
    }

    /// Submit the run's content file. With `wait`, block until the job is
    /// terminal; otherwise poll once and report the service's state.
    #[tracing::instrument(skip_all, fields(run_id = %run_id))]
    pub async fn embed_only(&self, run_id: &RunId, wait: bool) -> StageResult<EmbeddingOutcome> {
        let paths = self.paths(run_id);
        let stage = EmbeddingJobStage::new(self.embedding()?);
        let job = stage
            .submit(&paths.content_uri, &paths.embeddings_prefix, &job_display_name(run_id))
            .await?;

        if !wait {
            return poll_once(&stage, job).await;
        }

        let state = stage
            .wait_for_completion(&job, self.config.poll_interval, self.config.job_timeout)
            .await?;
        ensure_succeeded(&job, state)?;
        let output_uri = stage.output_uri(&job).await?;
        Ok(EmbeddingOutcome {
            job_name: job.name,
            state,
            output_uri: Some(output_uri),
        })
    }

    /// Check a previously submitted job once
    #[tracing::instrument(skip_all, fields(run_id = %run_id))]
    pub async fn poll_job(&self, run_id: &RunId, job_name: &str) -> StageResult<EmbeddingOutcome> {
        let paths = self.paths(run_id);
        let stage = EmbeddingJobStage::new(self.embedding()?);
        poll_once(&stage, JobHandle::new(job_name, paths.embeddings_prefix)).await
    }

    /// Re-run the merge. Shards are read from `embeddings_prefix` when
    /// given, else from anywhere under the run's embedding prefix.
    #[tracing::instrument(skip_all, fields(run_id = %run_id))]
    pub async fn transform_only(
        &self,
        run_id: &RunId,
        embeddings_prefix: Option<StorageUri>,
    ) -> StageResult<TransformOutcome> {
        let paths = self.paths(run_id);
        let prefix = embeddings_prefix.unwrap_or(paths.embeddings_prefix);
        TransformStage::new(self.store()?)
            .transform(&paths.metadata_uri, &prefix, &paths.vectors_uri)
            .await
    }

    /// Publish the run's datapoints file, in `mode` or the configured default
    #[tracing::instrument(skip_all, fields(run_id = %run_id))]
    pub async fn index_only(
        &self,
        run_id: &RunId,
        mode: Option<IndexUpdateMode>,
    ) -> StageResult<String> {
        let paths = self.paths(run_id);
        IndexUpdateStage::new(self.index()?, self.store()?)
            .update_index(&paths.vectors_uri, mode.unwrap_or(self.config.index_mode))
            .await
    }

    /// The persisted result of a finished run, if one was recorded
    pub async fn run_status(&self, run_id: &RunId) -> StageResult<Option<PipelineResult>> {
        let store = self.store()?;
        let uri = self.paths(run_id).record_uri;
        if !store.exists(&uri).await? {
            return Ok(None);
        }

        let mut reader = store.open_reader(&uri).await?;
        let mut raw = String::new();
        reader
            .read_to_string(&mut raw)
            .await
            .map_err(|e| PipelineError::transient("object storage", e))?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn persist_result(&self, paths: &RunPaths, result: &PipelineResult) {
        let Some(store) = self.clients.store.as_ref() else {
            return;
        };
        if let Err(e) = write_record(store.as_ref(), &paths.record_uri, result).await {
            tracing::warn!("Failed to persist run record to {}: {}", paths.record_uri, e);
        }
    }

    fn store(&self) -> StageResult<Arc<dyn ObjectStore>> {
        self.clients
            .store
            .clone()
            .ok_or(PipelineError::StorageUnavailable)
    }

    fn catalog(&self) -> StageResult<Arc<dyn CatalogReader>> {
        self.clients
            .catalog
            .clone()
            .ok_or_else(|| PipelineError::ConfigurationUnavailable("catalog reader".into()))
    }

    fn embedding(&self) -> StageResult<Arc<dyn EmbeddingBatchService>> {
        self.clients
            .embedding
            .clone()
            .ok_or_else(|| PipelineError::ConfigurationUnavailable("embedding service".into()))
    }

    fn index(&self) -> StageResult<Arc<dyn VectorIndexService>> {
        self.clients
            .index
            .clone()
            .ok_or_else(|| PipelineError::ConfigurationUnavailable("vector index".into()))
    }
}

async fn write_record(
    store: &dyn ObjectStore,
    uri: &StorageUri,
    result: &PipelineResult,
) -> StageResult<u64> {
    let json = serde_json::to_string(result)?;
    let mut writer = store.create_writer(uri).await?;
    writer.write_line(&json).await?;
    writer.finish().await
}

async fn poll_once(stage: &EmbeddingJobStage, job: JobHandle) -> StageResult<EmbeddingOutcome> {
    let state = stage.poll(&job).await?;
    let output_uri = if state == JobState::Succeeded {
        Some(stage.output_uri(&job).await?)
    } else {
        None
    };
    tracing::info!("🧠 Embedding job {} is {}", job.name, state);

    Ok(EmbeddingOutcome {
        job_name: job.name,
        state,
        output_uri,
    })
}

fn job_display_name(run_id: &RunId) -> String {
    format!("catalog-embeddings-{}", run_id)
}

fn ensure_succeeded(job: &JobHandle, state: JobState) -> StageResult<()> {
    if state == JobState::Succeeded {
        Ok(())
    } else {
        Err(PipelineError::JobFailed {
            job: job.name.clone(),
            state,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::{CatalogItem, PipelineStage, VectorDatapoint};
    use crate::testing::{FakeEmbeddingService, MemoryObjectStore, MemoryVectorIndex, StaticCatalog};

    struct Harness {
        store: Arc<MemoryObjectStore>,
        embedding: Arc<FakeEmbeddingService>,
        index: Arc<MemoryVectorIndex>,
        orchestrator: Arc<PipelineOrchestrator>,
    }

    fn catalog(n: usize) -> Vec<CatalogItem> {
        (1..=n)
            .map(|i| CatalogItem {
                id: format!("p{}", i),
                name: format!("Product {}", i),
                brand: Some(if i % 2 == 0 { "Acme" } else { "Globex" }.to_string()),
                category_id: Some("c1".to_string()),
                category_name: Some("Tools".to_string()),
                price: Some(i as f64 * 10.0),
                ..Default::default()
            })
            .collect()
    }

    fn harness(items: Vec<CatalogItem>, embedding: FakeEmbeddingService) -> Harness {
        let store = embedding.store();
        let embedding = Arc::new(embedding);
        let index = Arc::new(MemoryVectorIndex::new(store.clone(), "products"));
        let clients = PipelineClients {
            catalog: Some(Arc::new(StaticCatalog::new(items))),
            store: Some(store.clone()),
            embedding: Some(embedding.clone()),
            index: Some(index.clone()),
        };
        let config = PipelineConfig::new(StorageUri::parse("mem://bucket/pipeline").unwrap())
            .with_page_size(2)
            .with_poll_interval(Duration::from_secs(30))
            .with_job_timeout(Duration::from_secs(600));

        Harness {
            store,
            embedding,
            index,
            orchestrator: Arc::new(PipelineOrchestrator::new(clients, config)),
        }
    }

    fn run_id(s: &str) -> RunId {
        RunId::parse(s).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_run_publishes_positionally_aligned_datapoints() {
        let store = Arc::new(MemoryObjectStore::new());
        let h = harness(catalog(5), FakeEmbeddingService::new(store).with_shard_size(2));

        assert!(h.orchestrator.is_available());
        let result = h.orchestrator.run(run_id("r1")).await;

        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(result.final_stage, PipelineStage::Done);
        assert_eq!(result.exported_count, Some(5));
        assert_eq!(result.transformed_count, Some(5));
        assert_eq!(result.job_state, Some(JobState::Succeeded));
        assert_eq!(result.index_resource_id.as_deref(), Some("indexes/products"));

        let points = h.index.snapshot();
        assert_eq!(points.len(), 5);
        // item N was embedded as [N, N]
        let p4: &VectorDatapoint = &points["p4"];
        assert_eq!(p4.embedding, vec![4.0, 4.0]);
        assert_eq!(p4.restricts[1].allow, vec!["Acme".to_string()]);
        assert_eq!(p4.numeric_restricts[0].value_float, 40.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_record_is_persisted_and_readable() {
        let store = Arc::new(MemoryObjectStore::new());
        let h = harness(catalog(3), FakeEmbeddingService::new(store));

        let result = h.orchestrator.run(run_id("r2")).await;
        assert!(h
            .store
            .get("mem://bucket/pipeline/runs/r2/result.json")
            .is_some());

        let status = h.orchestrator.run_status(&run_id("r2")).await.unwrap();
        assert_eq!(status, Some(result));
        assert_eq!(h.orchestrator.run_status(&run_id("nope")).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_stops_run_with_partial_progress() {
        let store = Arc::new(MemoryObjectStore::new());
        let h = harness(
            catalog(4),
            FakeEmbeddingService::new(store).with_final_state(JobState::Failed),
        );

        let result = h.orchestrator.run(run_id("r3")).await;

        assert!(!result.success);
        assert_eq!(result.final_stage, PipelineStage::Failed);
        assert_eq!(result.failed_stage, Some(PipelineStage::EmbeddingPolling));
        assert_eq!(result.exported_count, Some(4));
        assert_eq!(result.job_state, Some(JobState::Failed));
        assert!(result.job_name.is_some());
        assert!(result.transformed_count.is_none());
        assert!(h.index.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_last_known_job_state() {
        let store = Arc::new(MemoryObjectStore::new());
        let h = harness(
            catalog(2),
            FakeEmbeddingService::new(store).with_running_polls(usize::MAX),
        );

        let result = h.orchestrator.run(run_id("r4")).await;

        assert!(!result.success);
        assert_eq!(result.job_state, Some(JobState::Running));
        assert!(result.error_message.unwrap().contains("terminal state"));
        // 600s timeout at 30s interval
        assert_eq!(h.embedding.poll_count(), 20);
    }

    #[tokio::test]
    async fn test_missing_client_reports_unavailable() {
        let store = Arc::new(MemoryObjectStore::new());
        let clients = PipelineClients {
            catalog: Some(Arc::new(StaticCatalog::new(catalog(1)))),
            store: Some(store),
            embedding: None,
            index: None,
        };
        let orchestrator = PipelineOrchestrator::new(
            clients,
            PipelineConfig::new(StorageUri::parse("mem://bucket/").unwrap()),
        );

        assert!(!orchestrator.is_available());
        let result = orchestrator.run(run_id("r5")).await;
        assert!(!result.success);
        assert!(result.exported_count.is_none());
        assert!(result.error_message.unwrap().starts_with("Service unavailable"));
    }

    #[tokio::test]
    async fn test_missing_store_is_storage_unavailable() {
        let orchestrator = PipelineOrchestrator::new(
            PipelineClients::default(),
            PipelineConfig::new(StorageUri::parse("mem://bucket/").unwrap()),
        );
        let err = orchestrator
            .transform_only(&run_id("r6"), None)
            .await
            .unwrap_err();
        assert_eq!(err, PipelineError::StorageUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_by_stage_resumption_matches_full_run() {
        let store = Arc::new(MemoryObjectStore::new());
        let h = harness(catalog(5), FakeEmbeddingService::new(store).with_shard_size(3));
        let run = run_id("manual");

        let export = h.orchestrator.export_only(&run).await.unwrap();
        assert_eq!(export.item_count, 5);

        // state comes from the service, not assumed
        let submitted = h.orchestrator.embed_only(&run, false).await.unwrap();
        assert_eq!(submitted.state, JobState::Running);
        assert!(submitted.output_uri.is_none());
        assert_eq!(h.embedding.poll_count(), 1);

        let polled = h.orchestrator.poll_job(&run, &submitted.job_name).await.unwrap();
        assert_eq!(polled.state, JobState::Succeeded);
        assert!(polled.output_uri.is_some());

        let transform = h.orchestrator.transform_only(&run, None).await.unwrap();
        assert_eq!(transform.transformed_count, 5);
        assert_eq!(transform.shard_count, 2);

        let resource = h
            .orchestrator
            .index_only(&run, Some(IndexUpdateMode::Incremental))
            .await
            .unwrap();
        assert_eq!(resource, "indexes/products");
        assert_eq!(h.index.update_count(IndexUpdateMode::Incremental), 1);
        assert_eq!(h.index.snapshot()["p5"].embedding, vec![5.0, 5.0]);
    }

    fn embedding_line(v: f32) -> String {
        format!(r#"{{"instance":{{}},"predictions":[{{"embeddings":{{"values":[{v:?}]}}}}]}}"#)
    }

    #[tokio::test]
    async fn test_transform_reads_only_latest_resubmitted_job() {
        let store = Arc::new(MemoryObjectStore::new());
        let h = harness(catalog(0), FakeEmbeddingService::new(store));
        let run = run_id("resubmitted");
        let paths = h.orchestrator.paths(&run);

        let metadata: String = ["a", "b", "c", "d"]
            .iter()
            .map(|id| format!("{{\"id\":\"{}\"}}\n", id))
            .collect();
        h.store.put(&paths.metadata_uri.to_string(), &metadata);

        // first submission's output, then a resubmission under the same run
        for (dir, base) in [
            ("prediction-model-2026-01-18T09:00:00Z", 10.0),
            ("prediction-model-2026-01-18T12:00:00Z", 0.0),
        ] {
            let out = paths.embeddings_prefix.join(dir).as_prefix();
            h.store.put(
                &out.join("prediction.results-00000-of-00002").to_string(),
                &format!("{}\n{}\n", embedding_line(base + 1.0), embedding_line(base + 2.0)),
            );
            h.store.put(
                &out.join("prediction.results-00001-of-00002").to_string(),
                &format!("{}\n{}\n", embedding_line(base + 3.0), embedding_line(base + 4.0)),
            );
        }

        let outcome = h.orchestrator.transform_only(&run, None).await.unwrap();
        assert_eq!(outcome.transformed_count, 4);
        assert_eq!(outcome.shard_count, 2);
        assert!(!outcome.has_count_mismatch());

        let pairs: Vec<(String, f32)> = h
            .store
            .lines(&paths.vectors_uri.to_string())
            .iter()
            .map(|line| {
                let point: VectorDatapoint = serde_json::from_str(line).unwrap();
                (point.id, point.embedding[0])
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), 1.0),
                ("b".to_string(), 2.0),
                ("c".to_string(), 3.0),
                ("d".to_string(), 4.0),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_run_completes_in_background() {
        let store = Arc::new(MemoryObjectStore::new());
        let h = harness(catalog(3), FakeEmbeddingService::new(store));

        let handle = h.orchestrator.spawn_run(run_id("bg"));
        let result = handle.await.unwrap();

        assert!(result.success);
        assert_eq!(h.index.snapshot().len(), 3);
    }
}
