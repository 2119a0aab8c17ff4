//! Google access tokens
//!
//! A token from `GOOGLE_ACCESS_TOKEN` is used as-is (local development).
//! Otherwise tokens come from the GCE/GKE metadata server and are cached
//! until shortly before they expire.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use catalog_indexer::PipelineError;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
/// Refresh this long before the reported expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

pub struct GoogleAuth {
    client: Client,
    static_token: Option<String>,
    cached: Mutex<Option<(String, Instant)>>,
}

impl GoogleAuth {
    pub fn new(client: Client, static_token: Option<String>) -> Self {
        Self {
            client,
            static_token,
            cached: Mutex::new(None),
        }
    }

    pub async fn token(&self) -> Result<String, PipelineError> {
        if let Some(token) = &self.static_token {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some((token, valid_until)) = cached.as_ref() {
            if Instant::now() < *valid_until {
                return Ok(token.clone());
            }
        }

        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                PipelineError::transient(
                    "google auth",
                    format!(
                        "metadata server unreachable: {}. Set GOOGLE_ACCESS_TOKEN for local development.",
                        e
                    ),
                )
            })?;

        if !response.status().is_success() {
            return Err(PipelineError::transient(
                "google auth",
                format!("metadata server returned {}", response.status()),
            ));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::transient("google auth", e))?;

        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cached = Some((body.access_token.clone(), Instant::now() + lifetime));
        tracing::debug!("Refreshed Google access token (valid for {:?})", lifetime);

        Ok(body.access_token)
    }
}
