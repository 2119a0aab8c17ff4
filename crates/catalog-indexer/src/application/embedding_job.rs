//! Embedding job stage - submit a batch job and wait for a terminal state

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::{JobHandle, JobState, PipelineError, StageResult, StorageUri};
use crate::ports::EmbeddingBatchService;

/// Deadline used when `started + timeout` is not representable
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 3600);

pub struct EmbeddingJobStage {
    service: Arc<dyn EmbeddingBatchService>,
}

impl EmbeddingJobStage {
    pub fn new(service: Arc<dyn EmbeddingBatchService>) -> Self {
        Self { service }
    }

    pub async fn submit(
        &self,
        input_uri: &StorageUri,
        output_prefix: &StorageUri,
        display_name: &str,
    ) -> StageResult<JobHandle> {
        let handle = self
            .service
            .submit(input_uri, &output_prefix.as_prefix(), display_name)
            .await?;
        tracing::info!("🧠 Submitted embedding job {} for {}", handle.name, input_uri);
        Ok(handle)
    }

    /// Current state, without waiting
    pub async fn poll(&self, job: &JobHandle) -> StageResult<JobState> {
        self.service.get_state(job).await
    }

    /// Poll every `interval` until the job is terminal.
    ///
    /// Returns the terminal state (which may be `Failed` or `Cancelled`).
    /// Fails with `JobTimeout` once `timeout` has elapsed without one.
    pub async fn wait_for_completion(
        &self,
        job: &JobHandle,
        interval: Duration,
        timeout: Duration,
    ) -> StageResult<JobState> {
        let started = Instant::now();
        let deadline = started
            .checked_add(timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let mut last_state = JobState::Pending;
        let mut polls = 0u32;

        loop {
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    job = %job.name,
                    polls,
                    "Embedding job still {} after {:?}",
                    last_state,
                    timeout
                );
                return Err(PipelineError::JobTimeout {
                    job: job.name.clone(),
                    waited_secs: timeout.as_secs(),
                    last_state,
                });
            }

            tokio::time::sleep(interval.min(deadline - now)).await;

            last_state = self.service.get_state(job).await?;
            polls += 1;
            tracing::debug!(job = %job.name, state = %last_state, polls, "Polled embedding job");

            if last_state.is_terminal() {
                tracing::info!(
                    "🧠 Embedding job {} reached {} after {} polls ({:?})",
                    job.name,
                    last_state,
                    polls,
                    started.elapsed()
                );
                return Ok(last_state);
            }
        }
    }

    /// Where the finished job wrote its shards
    pub async fn output_uri(&self, job: &JobHandle) -> StageResult<StorageUri> {
        self.service.get_output_uri(job).await
    }
}
