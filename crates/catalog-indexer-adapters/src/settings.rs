//! Environment-driven adapter settings and pipeline bootstrap
//!
//! A client whose configuration is missing is left out (with a warning)
//! rather than failing startup; the orchestrator then reports itself as
//! unavailable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use catalog_indexer::{
    CatalogReader, EmbeddingBatchService, ObjectStore, PipelineClients, PipelineConfig,
    PipelineOrchestrator, StorageUri, VectorIndexService,
};

use crate::auth::GoogleAuth;
use crate::postgres::PgCatalogReader;
use crate::qdrant::{QdrantConfig, QdrantVectorIndex};
use crate::storage::{FsObjectStore, GcsObjectStore, RoutingObjectStore};
use crate::vertex::{VertexBatchEmbedding, VertexConfig};

const DEFAULT_LOCATION: &str = "us-central1";
const DEFAULT_MODEL: &str = "text-embedding-004";
const DEFAULT_COLLECTION: &str = "catalog_products";

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },
}

/// Everything the adapters need, read from the environment
#[derive(Debug, Clone, Default)]
pub struct AdapterSettings {
    pub base_uri: Option<String>,
    pub page_size: Option<u32>,
    pub poll_interval_secs: Option<u64>,
    pub job_timeout_secs: Option<u64>,
    pub schedule_interval_secs: Option<u64>,
    pub database_url: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,
    pub qdrant_collection: Option<String>,
    pub gcp_project: Option<String>,
    pub vertex_location: Option<String>,
    pub vertex_model: Option<String>,
    pub google_access_token: Option<String>,
    pub fs_root: Option<PathBuf>,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, SettingsError> {
    match var(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SettingsError::Invalid {
                var: name,
                value: raw,
            }),
    }
}

impl AdapterSettings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Ok(Self {
            base_uri: var("CATALOG_INDEXER_BASE_URI"),
            page_size: parsed("CATALOG_INDEXER_PAGE_SIZE")?,
            poll_interval_secs: parsed("CATALOG_INDEXER_POLL_INTERVAL_SECS")?,
            job_timeout_secs: parsed("CATALOG_INDEXER_JOB_TIMEOUT_SECS")?,
            schedule_interval_secs: parsed("CATALOG_INDEXER_SCHEDULE_INTERVAL_SECS")?,
            database_url: var("DATABASE_URL"),
            qdrant_url: var("QDRANT_URL"),
            qdrant_api_key: var("QDRANT_API_KEY"),
            qdrant_collection: var("QDRANT_COLLECTION"),
            gcp_project: var("GOOGLE_CLOUD_PROJECT").or_else(|| var("GCP_PROJECT_ID")),
            vertex_location: var("VERTEX_AI_LOCATION"),
            vertex_model: var("VERTEX_EMBEDDING_MODEL"),
            google_access_token: var("GOOGLE_ACCESS_TOKEN"),
            fs_root: var("CATALOG_INDEXER_FS_ROOT").map(PathBuf::from),
        })
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig, SettingsError> {
        let raw = self
            .base_uri
            .as_deref()
            .ok_or(SettingsError::Missing("CATALOG_INDEXER_BASE_URI"))?;
        let base_uri = StorageUri::parse(raw).map_err(|_| SettingsError::Invalid {
            var: "CATALOG_INDEXER_BASE_URI",
            value: raw.to_string(),
        })?;

        let mut config = PipelineConfig::new(base_uri);
        if let Some(size) = self.page_size {
            config = config.with_page_size(size);
        }
        if let Some(secs) = self.poll_interval_secs {
            let secs = positive("CATALOG_INDEXER_POLL_INTERVAL_SECS", secs)?;
            config = config.with_poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.job_timeout_secs {
            let secs = positive("CATALOG_INDEXER_JOB_TIMEOUT_SECS", secs)?;
            config = config.with_job_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.schedule_interval_secs {
            let secs = positive("CATALOG_INDEXER_SCHEDULE_INTERVAL_SECS", secs)?;
            config = config.with_schedule_interval(Duration::from_secs(secs));
        }
        Ok(config)
    }

    fn google_auth(&self, client: &Client) -> Option<Arc<GoogleAuth>> {
        if self.gcp_project.is_none() && self.google_access_token.is_none() {
            return None;
        }
        Some(Arc::new(GoogleAuth::new(
            client.clone(),
            self.google_access_token.clone(),
        )))
    }

    /// Build every client that is configured.
    ///
    /// Must be called within a Tokio runtime (the Postgres pool spawns its
    /// maintenance task).
    pub fn build_clients(&self) -> PipelineClients {
        let http = Client::new();
        let auth = self.google_auth(&http);

        let store = self.build_store(&http, auth.clone());
        let catalog = self.build_catalog();
        let embedding = self.build_embedding(&http, auth);
        let index = store.clone().and_then(|store| self.build_index(store));

        PipelineClients {
            catalog,
            store,
            embedding,
            index,
        }
    }

    fn build_store(
        &self,
        http: &Client,
        auth: Option<Arc<GoogleAuth>>,
    ) -> Option<Arc<dyn ObjectStore>> {
        let mut routing = RoutingObjectStore::new();
        if let Some(root) = &self.fs_root {
            routing = routing.with_backend(Arc::new(FsObjectStore::new(root.clone())));
        }
        if let Some(auth) = auth {
            routing = routing.with_backend(Arc::new(GcsObjectStore::new(http.clone(), auth)));
        }

        if routing.is_empty() {
            tracing::warn!(
                "⚠️ No object store configured (set CATALOG_INDEXER_FS_ROOT or GOOGLE_CLOUD_PROJECT)"
            );
            return None;
        }
        Some(Arc::new(routing))
    }

    fn build_catalog(&self) -> Option<Arc<dyn CatalogReader>> {
        let Some(url) = &self.database_url else {
            tracing::warn!("⚠️ DATABASE_URL not set, catalog export disabled");
            return None;
        };
        match PgPoolOptions::new().max_connections(5).connect_lazy(url) {
            Ok(pool) => Some(Arc::new(PgCatalogReader::new(pool))),
            Err(e) => {
                tracing::warn!("⚠️ Invalid DATABASE_URL: {}", e);
                None
            }
        }
    }

    fn build_embedding(
        &self,
        http: &Client,
        auth: Option<Arc<GoogleAuth>>,
    ) -> Option<Arc<dyn EmbeddingBatchService>> {
        let (Some(project), Some(auth)) = (&self.gcp_project, auth) else {
            tracing::warn!("⚠️ GOOGLE_CLOUD_PROJECT not set, embedding jobs disabled");
            return None;
        };
        let config = VertexConfig::new(
            project.clone(),
            self.vertex_location.as_deref().unwrap_or(DEFAULT_LOCATION),
        )
        .with_model(self.vertex_model.as_deref().unwrap_or(DEFAULT_MODEL));

        tracing::info!("🧠 Vertex AI batch embedding enabled (model: {})", config.model);
        Some(Arc::new(VertexBatchEmbedding::new(http.clone(), auth, config)))
    }

    fn build_index(&self, store: Arc<dyn ObjectStore>) -> Option<Arc<dyn VectorIndexService>> {
        let Some(url) = &self.qdrant_url else {
            tracing::warn!("⚠️ QDRANT_URL not set, index updates disabled");
            return None;
        };
        let mut config = QdrantConfig::new(
            url.clone(),
            self.qdrant_collection.as_deref().unwrap_or(DEFAULT_COLLECTION),
        );
        if let Some(key) = &self.qdrant_api_key {
            config = config.with_api_key(key.clone());
        }

        match QdrantVectorIndex::new(config, store) {
            Ok(index) => Some(Arc::new(index)),
            Err(e) => {
                tracing::warn!("⚠️ Failed to build Qdrant client: {}", e);
                None
            }
        }
    }

    /// Config plus every configured client, wired into an orchestrator
    pub fn build_orchestrator(&self) -> Result<PipelineOrchestrator, SettingsError> {
        let config = self.pipeline_config()?;
        let clients = self.build_clients();
        Ok(PipelineOrchestrator::new(clients, config))
    }
}

fn positive(var: &'static str, secs: u64) -> Result<u64, SettingsError> {
    if secs == 0 {
        return Err(SettingsError::Invalid {
            var,
            value: secs.to_string(),
        });
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_VARS: [&str; 15] = [
        "CATALOG_INDEXER_BASE_URI",
        "CATALOG_INDEXER_PAGE_SIZE",
        "CATALOG_INDEXER_POLL_INTERVAL_SECS",
        "CATALOG_INDEXER_JOB_TIMEOUT_SECS",
        "CATALOG_INDEXER_SCHEDULE_INTERVAL_SECS",
        "DATABASE_URL",
        "QDRANT_URL",
        "QDRANT_API_KEY",
        "QDRANT_COLLECTION",
        "GOOGLE_CLOUD_PROJECT",
        "GCP_PROJECT_ID",
        "VERTEX_AI_LOCATION",
        "VERTEX_EMBEDDING_MODEL",
        "GOOGLE_ACCESS_TOKEN",
        "CATALOG_INDEXER_FS_ROOT",
    ];

    /// Run `f` with every setting cleared except `set`
    fn with_env<F: FnOnce()>(set: &[(&'static str, &'static str)], f: F) {
        let vars: Vec<(&str, Option<&str>)> = ALL_VARS
            .iter()
            .map(|name| {
                let value = set.iter().find(|(k, _)| k == name).map(|(_, v)| *v);
                (*name, value)
            })
            .collect();
        temp_env::with_vars(vars, f);
    }

    #[test]
    fn test_defaults_when_unset() {
        with_env(&[("CATALOG_INDEXER_BASE_URI", "gs://catalog/pipeline")], || {
            let settings = AdapterSettings::from_env().unwrap();
            let config = settings.pipeline_config().unwrap();
            assert_eq!(config.base_uri.to_string(), "gs://catalog/pipeline");
            assert_eq!(config.page_size, 500);
            assert_eq!(config.poll_interval, Duration::from_secs(60));
            assert_eq!(config.job_timeout, Duration::from_secs(24 * 3600));
            assert!(settings.database_url.is_none());
        });
    }

    #[test]
    fn test_custom_values() {
        with_env(
            &[
                ("CATALOG_INDEXER_BASE_URI", "file://local/"),
                ("CATALOG_INDEXER_PAGE_SIZE", "250"),
                ("CATALOG_INDEXER_POLL_INTERVAL_SECS", "15"),
                ("CATALOG_INDEXER_JOB_TIMEOUT_SECS", "3600"),
                ("GCP_PROJECT_ID", "fallback-project"),
            ],
            || {
                let settings = AdapterSettings::from_env().unwrap();
                assert_eq!(settings.gcp_project.as_deref(), Some("fallback-project"));
                let config = settings.pipeline_config().unwrap();
                assert_eq!(config.page_size, 250);
                assert_eq!(config.poll_interval, Duration::from_secs(15));
                assert_eq!(config.job_timeout, Duration::from_secs(3600));
            },
        );
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        with_env(&[("CATALOG_INDEXER_PAGE_SIZE", "lots")], || {
            let err = AdapterSettings::from_env().unwrap_err();
            assert_eq!(
                err,
                SettingsError::Invalid {
                    var: "CATALOG_INDEXER_PAGE_SIZE",
                    value: "lots".into()
                }
            );
        });
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        for var in [
            "CATALOG_INDEXER_POLL_INTERVAL_SECS",
            "CATALOG_INDEXER_JOB_TIMEOUT_SECS",
            "CATALOG_INDEXER_SCHEDULE_INTERVAL_SECS",
        ] {
            with_env(&[("CATALOG_INDEXER_BASE_URI", "file://local/"), (var, "0")], || {
                let settings = AdapterSettings::from_env().unwrap();
                assert_eq!(
                    settings.pipeline_config().unwrap_err(),
                    SettingsError::Invalid {
                        var,
                        value: "0".into()
                    }
                );
            });
        }
    }

    #[test]
    fn test_missing_base_uri() {
        with_env(&[], || {
            let settings = AdapterSettings::from_env().unwrap();
            assert_eq!(
                settings.pipeline_config().unwrap_err(),
                SettingsError::Missing("CATALOG_INDEXER_BASE_URI")
            );
        });
    }

    #[tokio::test]
    async fn test_partial_configuration_degrades_to_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let settings = AdapterSettings {
            base_uri: Some("file://local/".into()),
            fs_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let clients = settings.build_clients();
        assert!(clients.store.is_some());
        assert!(clients.catalog.is_none());
        assert!(clients.embedding.is_none());
        assert!(clients.index.is_none());

        let orchestrator = settings.build_orchestrator().unwrap();
        assert!(!orchestrator.is_available());
    }
}
