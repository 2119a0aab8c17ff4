//! Value Objects
//!
//! Immutable types without identity.

mod index_mode;
mod job_state;
mod pipeline_stage;
mod restrict;
mod run_id;
mod storage_uri;

pub use index_mode::IndexUpdateMode;
pub use job_state::JobState;
pub use pipeline_stage::{PipelineStage, StageTracker};
pub use restrict::{derive_restricts, CategoricalRestrict, NumericRestrict, Restrict, RestrictField};
pub use run_id::RunId;
pub use storage_uri::StorageUri;
