//! Pipeline configuration

use std::time::Duration;

use crate::domain::{IndexUpdateMode, StorageUri};

/// Default catalog page size for export
pub const DEFAULT_PAGE_SIZE: u32 = 500;
/// Default interval between embedding-job polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
/// Default ceiling on the embedding-job wait (24 hours)
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(24 * 3600);
/// Default interval between scheduled runs
pub const DEFAULT_SCHEDULE_INTERVAL: Duration = Duration::from_secs(24 * 3600);
/// Floor for the poll and schedule intervals
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Settings shared by all stages of a run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which every run's paths are derived
    pub base_uri: StorageUri,
    pub page_size: u32,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    /// Mode used by full runs and by `index_only` when none is given
    pub index_mode: IndexUpdateMode,
    pub schedule_interval: Duration,
}

impl PipelineConfig {
    pub fn new(base_uri: StorageUri) -> Self {
        Self {
            base_uri,
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            index_mode: IndexUpdateMode::default(),
            schedule_interval: DEFAULT_SCHEDULE_INTERVAL,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_INTERVAL);
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_schedule_interval(mut self, interval: Duration) -> Self {
        self.schedule_interval = interval.max(MIN_INTERVAL);
        self
    }

    pub fn with_index_mode(mut self, mode: IndexUpdateMode) -> Self {
        self.index_mode = mode;
        self
    }
}
