//! Vertex AI batch prediction adapter
//!
//! Submits the content file as a `batchPredictionJobs` resource against a
//! publisher text-embedding model and reads its state back.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use catalog_indexer::{EmbeddingBatchService, JobHandle, JobState, PipelineError, StorageUri};

use crate::auth::GoogleAuth;
use crate::http::ensure_success;

const SERVICE: &str = "vertex ai";

/// Vertex AI batch embedding configuration
#[derive(Debug, Clone)]
pub struct VertexConfig {
    /// GCP Project ID
    pub project_id: String,
    /// GCP Region (e.g., "us-central1")
    pub location: String,
    /// Publisher model id (e.g., "text-embedding-004")
    pub model: String,
}

impl VertexConfig {
    pub fn new(project_id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            model: "text-embedding-004".to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn api_base(&self) -> String {
        format!("https://{}-aiplatform.googleapis.com/v1", self.location)
    }

    fn jobs_url(&self) -> String {
        format!(
            "{}/projects/{}/locations/{}/batchPredictionJobs",
            self.api_base(),
            self.project_id,
            self.location
        )
    }

    fn model_resource(&self) -> String {
        format!("publishers/google/models/{}", self.model)
    }
}

// Vertex AI request/response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobRequest {
    display_name: String,
    model: String,
    input_config: InputConfig,
    output_config: OutputConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InputConfig {
    instances_format: &'static str,
    gcs_source: GcsSource,
}

#[derive(Debug, Serialize)]
struct GcsSource {
    uris: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputConfig {
    predictions_format: &'static str,
    gcs_destination: GcsDestination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GcsDestination {
    output_uri_prefix: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    name: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    output_info: Option<OutputInfo>,
    #[serde(default)]
    error: Option<JobError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputInfo {
    gcs_output_directory: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobError {
    #[serde(default)]
    message: String,
}

pub struct VertexBatchEmbedding {
    client: Client,
    auth: Arc<GoogleAuth>,
    config: VertexConfig,
}

impl VertexBatchEmbedding {
    pub fn new(client: Client, auth: Arc<GoogleAuth>, config: VertexConfig) -> Self {
        Self {
            client,
            auth,
            config,
        }
    }

    async fn fetch(&self, job: &JobHandle) -> Result<JobResource, PipelineError> {
        let token = self.auth.token().await?;
        let response = self
            .client
            .get(format!("{}/{}", self.config.api_base(), job.name))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PipelineError::transient(SERVICE, e))?;

        ensure_success(response, SERVICE)
            .await?
            .json()
            .await
            .map_err(|e| PipelineError::transient(SERVICE, e))
    }
}

#[async_trait]
impl EmbeddingBatchService for VertexBatchEmbedding {
    async fn submit(
        &self,
        input_uri: &StorageUri,
        output_prefix: &StorageUri,
        display_name: &str,
    ) -> Result<JobHandle, PipelineError> {
        let request = CreateJobRequest {
            display_name: display_name.to_string(),
            model: self.config.model_resource(),
            input_config: InputConfig {
                instances_format: "jsonl",
                gcs_source: GcsSource {
                    uris: vec![input_uri.to_string()],
                },
            },
            output_config: OutputConfig {
                predictions_format: "jsonl",
                gcs_destination: GcsDestination {
                    output_uri_prefix: output_prefix.to_string(),
                },
            },
        };

        let token = self.auth.token().await?;
        let response = self
            .client
            .post(self.config.jobs_url())
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::transient(SERVICE, e))?;

        let job: JobResource = ensure_success(response, SERVICE)
            .await?
            .json()
            .await
            .map_err(|e| PipelineError::transient(SERVICE, e))?;

        Ok(JobHandle::new(job.name, output_prefix.clone()))
    }

    async fn get_state(&self, job: &JobHandle) -> Result<JobState, PipelineError> {
        let resource = self.fetch(job).await?;
        let raw = resource.state.unwrap_or_default();

        let state = match JobState::from_service_state(&raw) {
            Some(state) => state,
            None => {
                tracing::warn!(job = %job.name, "Unrecognised job state {:?}, treating as pending", raw);
                JobState::Pending
            }
        };

        if state == JobState::Failed {
            if let Some(error) = resource.error {
                tracing::warn!(job = %job.name, "Embedding job failed: {}", error.message);
            }
        }
        Ok(state)
    }

    async fn get_output_uri(&self, job: &JobHandle) -> Result<StorageUri, PipelineError> {
        let resource = self.fetch(job).await?;
        match resource.output_info.and_then(|o| o.gcs_output_directory) {
            Some(dir) => Ok(StorageUri::parse(&dir)?.as_prefix()),
            None => {
                tracing::warn!(
                    job = %job.name,
                    "Job reported no output directory, falling back to {}",
                    job.output_prefix
                );
                Ok(job.output_prefix.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_shape() {
        let config = VertexConfig::new("proj", "us-central1").with_model("text-embedding-005");
        let request = CreateJobRequest {
            display_name: "catalog-embeddings-r1".into(),
            model: config.model_resource(),
            input_config: InputConfig {
                instances_format: "jsonl",
                gcs_source: GcsSource {
                    uris: vec!["gs://b/runs/r1/export/content.jsonl".into()],
                },
            },
            output_config: OutputConfig {
                predictions_format: "jsonl",
                gcs_destination: GcsDestination {
                    output_uri_prefix: "gs://b/runs/r1/embeddings/".into(),
                },
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "publishers/google/models/text-embedding-005");
        assert_eq!(json["inputConfig"]["instancesFormat"], "jsonl");
        assert_eq!(
            json["outputConfig"]["gcsDestination"]["outputUriPrefix"],
            "gs://b/runs/r1/embeddings/"
        );
        assert_eq!(
            config.jobs_url(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/proj/locations/us-central1/batchPredictionJobs"
        );
    }

    #[test]
    fn test_job_resource_parses_output_directory() {
        let body = r#"{
            "name": "projects/1/locations/us-central1/batchPredictionJobs/42",
            "state": "JOB_STATE_SUCCEEDED",
            "outputInfo": {"gcsOutputDirectory": "gs://b/runs/r1/embeddings/prediction-model-2024"}
        }"#;
        let job: JobResource = serde_json::from_str(body).unwrap();
        assert_eq!(
            JobState::from_service_state(job.state.as_deref().unwrap()),
            Some(JobState::Succeeded)
        );
        assert_eq!(
            job.output_info.unwrap().gcs_output_directory.as_deref(),
            Some("gs://b/runs/r1/embeddings/prediction-model-2024")
        );
    }
}
