//! IndexUpdateMode - How datapoints are applied to the vector index

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IndexUpdateMode {
    /// Replace the index's entire dataset
    #[default]
    CompleteOverwrite,
    /// Merge by datapoint id
    Incremental,
}

impl IndexUpdateMode {
    pub fn from_overwrite_flag(complete_overwrite: bool) -> Self {
        if complete_overwrite {
            IndexUpdateMode::CompleteOverwrite
        } else {
            IndexUpdateMode::Incremental
        }
    }

    pub fn is_complete_overwrite(&self) -> bool {
        matches!(self, IndexUpdateMode::CompleteOverwrite)
    }
}

impl std::fmt::Display for IndexUpdateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexUpdateMode::CompleteOverwrite => write!(f, "complete_overwrite"),
            IndexUpdateMode::Incremental => write!(f, "incremental"),
        }
    }
}
