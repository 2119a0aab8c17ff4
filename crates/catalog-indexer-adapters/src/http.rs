//! Shared handling of Google REST responses

use reqwest::{Response, StatusCode};

use catalog_indexer::PipelineError;

/// Pass successful responses through; turn anything else into a transient
/// failure carrying the status and response body.
pub(crate) async fn ensure_success(
    response: Response,
    service: &str,
) -> Result<Response, PipelineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(PipelineError::transient(service, format!("{}: {}", status, body.trim())))
}

pub(crate) fn is_not_found(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND
}
