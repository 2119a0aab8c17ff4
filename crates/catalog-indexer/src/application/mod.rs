//! Application Layer
//!
//! The four pipeline stages, the orchestrator that sequences them, and the
//! periodic scheduler. Stages only talk to the outside world through ports.

mod config;
mod embedding_job;
mod export;
mod index_update;
mod orchestrator;
mod scheduler;
mod streams;
mod transform;

pub use config::{
    PipelineConfig, DEFAULT_JOB_TIMEOUT, DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL,
    DEFAULT_SCHEDULE_INTERVAL, MIN_INTERVAL,
};
pub use embedding_job::EmbeddingJobStage;
pub use export::ExportStage;
pub use index_update::IndexUpdateStage;
pub use orchestrator::{PipelineClients, PipelineOrchestrator};
pub use scheduler::{maybe_start_scheduler, PipelineScheduler, SchedulerConfig};
pub use streams::{discover_shards, is_shard_file, LineStream, ShardedLineStream};
pub use transform::TransformStage;
