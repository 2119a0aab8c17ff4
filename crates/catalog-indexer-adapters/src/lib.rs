//! Catalog Indexer Adapters
//!
//! Infrastructure implementations of the `catalog_indexer` ports.
//!
//! - `storage/`: object storage (`file://` local directory, `gs://` Cloud Storage)
//! - `postgres`: product catalog reader
//! - `vertex`: Vertex AI batch embedding jobs
//! - `qdrant`: vector index updates
//! - `settings`: environment configuration and orchestrator bootstrap
//!
//! # Usage
//!
//! ```rust,ignore
//! use catalog_indexer_adapters::AdapterSettings;
//!
//! let settings = AdapterSettings::from_env()?;
//! let orchestrator = settings.build_orchestrator()?;
//! ```

pub mod auth;
mod http;
pub mod postgres;
pub mod qdrant;
pub mod settings;
pub mod storage;
pub mod vertex;

pub use auth::GoogleAuth;
pub use postgres::PgCatalogReader;
pub use qdrant::{QdrantConfig, QdrantVectorIndex};
pub use settings::{AdapterSettings, SettingsError};
pub use storage::{FsObjectStore, GcsObjectStore, RoutingObjectStore};
pub use vertex::{VertexBatchEmbedding, VertexConfig};
