//! JobState - Lifecycle of an external batch-embedding job

use serde::{Deserialize, Serialize};

/// State of an embedding job as reported by the external service
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }

    /// Map a service-side state name (`JOB_STATE_RUNNING`, `RUNNING`, ...)
    pub fn from_service_state(raw: &str) -> Option<Self> {
        let name = raw.trim().to_ascii_uppercase();
        let name = name.strip_prefix("JOB_STATE_").unwrap_or(&name);
        match name {
            "QUEUED" | "PENDING" => Some(JobState::Pending),
            "RUNNING" | "CANCELLING" | "UPDATING" | "PAUSED" => Some(JobState::Running),
            "SUCCEEDED" | "PARTIALLY_SUCCEEDED" => Some(JobState::Succeeded),
            "FAILED" | "EXPIRED" => Some(JobState::Failed),
            "CANCELLED" => Some(JobState::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "PENDING"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Succeeded => write!(f, "SUCCEEDED"),
            JobState::Failed => write!(f, "FAILED"),
            JobState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_service_state(s).ok_or_else(|| format!("Unknown job state: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_state_names() {
        assert_eq!(
            JobState::from_service_state("JOB_STATE_QUEUED"),
            Some(JobState::Pending)
        );
        assert_eq!(
            JobState::from_service_state("JOB_STATE_CANCELLING"),
            Some(JobState::Running)
        );
        assert_eq!(
            JobState::from_service_state("JOB_STATE_PARTIALLY_SUCCEEDED"),
            Some(JobState::Succeeded)
        );
        assert_eq!(
            JobState::from_service_state("JOB_STATE_EXPIRED"),
            Some(JobState::Failed)
        );
        assert_eq!("cancelled".parse::<JobState>(), Ok(JobState::Cancelled));
        assert!(JobState::from_service_state("JOB_STATE_UNSPECIFIED").is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }
}
