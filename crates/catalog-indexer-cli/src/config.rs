//! Configuration file for the catalog-indexer CLI
//!
//! Defaults live in ~/.config/catalog-indexer/config.toml. Any value also
//! present in the environment (or `.env`) is taken from the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use catalog_indexer_adapters::AdapterSettings;

const CONFIG_DIR: &str = "catalog-indexer";
const CONFIG_FILE: &str = "config.toml";

/// CLI Configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(default)]
    pub qdrant: QdrantSection,
    #[serde(default)]
    pub vertex: VertexSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QdrantSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VertexSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join(CONFIG_DIR);
        Ok(dir.join(CONFIG_FILE))
    }

    /// Load the user's config file, or defaults if there is none
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Fill every setting the environment left unset from this file
    pub fn fill(&self, mut settings: AdapterSettings) -> AdapterSettings {
        fn or<T: Clone>(slot: &mut Option<T>, fallback: &Option<T>) {
            if slot.is_none() {
                *slot = fallback.clone();
            }
        }

        or(&mut settings.base_uri, &self.base_uri);
        or(&mut settings.fs_root, &self.fs_root);
        or(&mut settings.page_size, &self.page_size);
        or(&mut settings.poll_interval_secs, &self.poll_interval_secs);
        or(&mut settings.job_timeout_secs, &self.job_timeout_secs);
        or(&mut settings.schedule_interval_secs, &self.schedule_interval_secs);
        or(&mut settings.database_url, &self.database_url);
        or(&mut settings.qdrant_url, &self.qdrant.url);
        or(&mut settings.qdrant_collection, &self.qdrant.collection);
        or(&mut settings.gcp_project, &self.vertex.project);
        or(&mut settings.vertex_location, &self.vertex.location);
        or(&mut settings.vertex_model, &self.vertex.model);
        settings
    }
}
