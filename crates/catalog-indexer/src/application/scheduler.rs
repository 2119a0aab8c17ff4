//! Pipeline Scheduler - periodic full runs
//!
//! Mints a fresh run id every interval and dispatches it through the
//! background path. Cycles never overlap: the next tick waits for the
//! current run to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};

use crate::domain::RunId;

use super::config::MIN_INTERVAL;
use super::orchestrator::PipelineOrchestrator;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between pipeline runs
    pub interval: Duration,
    /// Enable/disable scheduler
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: super::config::DEFAULT_SCHEDULE_INTERVAL,
            enabled: true,
        }
    }
}

pub struct PipelineScheduler {
    orchestrator: Arc<PipelineOrchestrator>,
    config: SchedulerConfig,
}

impl PipelineScheduler {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, config: Option<SchedulerConfig>) -> Self {
        Self {
            orchestrator,
            config: config.unwrap_or_default(),
        }
    }

    /// Start the scheduler (runs in background)
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        if !self.config.enabled {
            tracing::info!("📅 Pipeline scheduler disabled");
            return;
        }

        tracing::info!(
            "📅 Pipeline scheduler started (interval: {:?})",
            self.config.interval
        );

        let mut ticker = interval(self.config.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let run_id = RunId::generate();
            tracing::info!("🔄 Scheduler: starting run {}", run_id);

            match self.orchestrator.spawn_run(run_id.clone()).await {
                Ok(result) if result.success => {
                    tracing::info!(
                        "  ✅ {}: {} datapoints published in {}ms",
                        result.run_id,
                        result.transformed_count.unwrap_or(0),
                        result.duration_ms
                    );
                }
                Ok(result) => {
                    tracing::warn!(
                        "  ❌ {}: failed at {:?}: {}",
                        result.run_id,
                        result.failed_stage,
                        result.error_message.as_deref().unwrap_or("unknown error")
                    );
                }
                Err(e) => {
                    tracing::warn!("  ❌ {}: run task aborted: {}", run_id, e);
                }
            }
        }
    }
}

/// Start the scheduler if the orchestrator is built and all its clients are available
pub fn maybe_start_scheduler(
    orchestrator: Option<Arc<PipelineOrchestrator>>,
    interval_secs: Option<u64>,
) -> Option<tokio::task::JoinHandle<()>> {
    let orchestrator = orchestrator?;
    if !orchestrator.is_available() {
        tracing::warn!("Pipeline scheduler not started: pipeline clients are not all configured");
        return None;
    }

    let interval = interval_secs
        .map(|secs| Duration::from_secs(secs).max(MIN_INTERVAL))
        .unwrap_or(orchestrator.config().schedule_interval);
    let config = SchedulerConfig {
        interval,
        enabled: true,
    };

    Some(PipelineScheduler::new(orchestrator, Some(config)).start())
}
