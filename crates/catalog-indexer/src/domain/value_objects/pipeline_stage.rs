//! PipelineStage - Orchestrator state machine

use serde::{Deserialize, Serialize};

/// Where a run currently is
///
/// Happy path: `NotStarted → Exporting → EmbeddingSubmitted → EmbeddingPolling
/// → Transforming → IndexUpdating → Done`. `Failed` is reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    #[default]
    NotStarted,
    Exporting,
    EmbeddingSubmitted,
    EmbeddingPolling,
    Transforming,
    IndexUpdating,
    Done,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Done | PipelineStage::Failed)
    }

    /// Next stage on the happy path
    pub fn next(&self) -> Option<Self> {
        match self {
            PipelineStage::NotStarted => Some(PipelineStage::Exporting),
            PipelineStage::Exporting => Some(PipelineStage::EmbeddingSubmitted),
            PipelineStage::EmbeddingSubmitted => Some(PipelineStage::EmbeddingPolling),
            PipelineStage::EmbeddingPolling => Some(PipelineStage::Transforming),
            PipelineStage::Transforming => Some(PipelineStage::IndexUpdating),
            PipelineStage::IndexUpdating => Some(PipelineStage::Done),
            PipelineStage::Done | PipelineStage::Failed => None,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStage::NotStarted => write!(f, "NOT_STARTED"),
            PipelineStage::Exporting => write!(f, "EXPORTING"),
            PipelineStage::EmbeddingSubmitted => write!(f, "EMBEDDING_SUBMITTED"),
            PipelineStage::EmbeddingPolling => write!(f, "EMBEDDING_POLLING"),
            PipelineStage::Transforming => write!(f, "TRANSFORMING"),
            PipelineStage::IndexUpdating => write!(f, "INDEX_UPDATING"),
            PipelineStage::Done => write!(f, "DONE"),
            PipelineStage::Failed => write!(f, "FAILED"),
        }
    }
}

/// Tracks one run's position in the state machine
#[derive(Debug, Default)]
pub struct StageTracker {
    current: PipelineStage,
    last_active: Option<PipelineStage>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> PipelineStage {
        self.current
    }

    /// Last non-terminal stage entered (the one that failed, after `fail`)
    pub fn last_active(&self) -> Option<PipelineStage> {
        self.last_active
    }

    /// Move along the happy path. Returns the new stage, or `None` if the
    /// run already finished.
    pub fn advance(&mut self) -> Option<PipelineStage> {
        let next = self.current.next()?;
        tracing::debug!(from = %self.current, to = %next, "Pipeline stage transition");
        if !next.is_terminal() {
            self.last_active = Some(next);
        }
        self.current = next;
        Some(next)
    }

    /// Enter `Failed`. No-op once terminal.
    pub fn fail(&mut self) -> bool {
        if self.current.is_terminal() {
            return false;
        }
        tracing::debug!(from = %self.current, "Pipeline stage transition to FAILED");
        self.current = PipelineStage::Failed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_reaches_done() {
        let mut tracker = StageTracker::new();
        let mut seen = vec![tracker.current()];
        while let Some(stage) = tracker.advance() {
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                PipelineStage::NotStarted,
                PipelineStage::Exporting,
                PipelineStage::EmbeddingSubmitted,
                PipelineStage::EmbeddingPolling,
                PipelineStage::Transforming,
                PipelineStage::IndexUpdating,
                PipelineStage::Done,
            ]
        );
        assert!(!tracker.fail());
    }

    #[test]
    fn test_fail_from_middle_records_last_active() {
        let mut tracker = StageTracker::new();
        tracker.advance();
        tracker.advance();
        assert!(tracker.fail());
        assert_eq!(tracker.current(), PipelineStage::Failed);
        assert_eq!(tracker.last_active(), Some(PipelineStage::EmbeddingSubmitted));
        assert_eq!(tracker.advance(), None);
    }
}
