//! Google Cloud Storage object store (JSON API)
//!
//! Reads stream the object body through a `StreamReader`; writes use a
//! resumable upload session fed in 8 MiB chunks, so neither side holds a
//! whole object in memory.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use tokio_util::io::StreamReader;

use catalog_indexer::{ObjectReader, ObjectStore, ObjectWriter, PipelineError, StorageUri};

use crate::auth::GoogleAuth;
use crate::http::{ensure_success, is_not_found};

const SCHEME: &str = "gs";
const SERVICE: &str = "cloud storage";
const API_BASE: &str = "https://storage.googleapis.com/storage/v1";
const UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";
/// Resumable chunks must be multiples of 256 KiB
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

fn object_url(uri: &StorageUri) -> String {
    format!(
        "{}/b/{}/o/{}",
        API_BASE,
        uri.bucket(),
        urlencoding::encode(uri.path())
    )
}

pub struct GcsObjectStore {
    client: Client,
    auth: Arc<GoogleAuth>,
}

impl GcsObjectStore {
    pub fn new(client: Client, auth: Arc<GoogleAuth>) -> Self {
        Self { client, auth }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ListItem {
    name: String,
}

struct GcsWriter {
    client: Client,
    auth: Arc<GoogleAuth>,
    uri: StorageUri,
    session_url: String,
    buffer: Vec<u8>,
    /// Bytes already acknowledged by the upload session
    offset: u64,
}

impl GcsWriter {
    /// Send `len` buffered bytes. `last` closes the upload with the total size.
    async fn send_chunk(&mut self, len: usize, last: bool) -> Result<(), PipelineError> {
        let chunk: Vec<u8> = self.buffer.drain(..len).collect();
        let start = self.offset;
        let end = start + chunk.len() as u64;

        let range = match (chunk.is_empty(), last) {
            (true, true) => format!("bytes */{}", end),
            (false, true) => format!("bytes {}-{}/{}", start, end - 1, end),
            (false, false) => format!("bytes {}-{}/*", start, end - 1),
            (true, false) => return Ok(()),
        };

        let token = self.auth.token().await?;
        let response = self
            .client
            .put(&self.session_url)
            .bearer_auth(token)
            .header(header::CONTENT_RANGE, range)
            .body(chunk)
            .send()
            .await
            .map_err(|e| PipelineError::transient(SERVICE, e))?;

        // 308 means the session wants more data
        if response.status() != StatusCode::PERMANENT_REDIRECT {
            ensure_success(response, SERVICE).await?;
        }
        self.offset = end;
        Ok(())
    }
}

#[async_trait]
impl ObjectWriter for GcsWriter {
    async fn write_line(&mut self, line: &str) -> Result<(), PipelineError> {
        self.buffer.extend_from_slice(line.as_bytes());
        self.buffer.push(b'\n');
        while self.buffer.len() >= CHUNK_SIZE {
            self.send_chunk(CHUNK_SIZE, false).await?;
        }
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<u64, PipelineError> {
        let mut this = *self;
        let remaining = this.buffer.len();
        this.send_chunk(remaining, true).await?;
        tracing::debug!("Uploaded {} bytes to {}", this.offset, this.uri);
        Ok(this.offset)
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    fn supports(&self, uri: &StorageUri) -> bool {
        uri.scheme() == SCHEME
    }

    async fn open_reader(&self, uri: &StorageUri) -> Result<ObjectReader, PipelineError> {
        let token = self.auth.token().await?;
        let response = self
            .client
            .get(object_url(uri))
            .query(&[("alt", "media")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PipelineError::transient(SERVICE, e))?;

        if is_not_found(response.status()) {
            return Err(PipelineError::ObjectNotFound(uri.to_string()));
        }
        let response = ensure_success(response, SERVICE).await?;

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }

    async fn create_writer(
        &self,
        uri: &StorageUri,
    ) -> Result<Box<dyn ObjectWriter>, PipelineError> {
        let token = self.auth.token().await?;
        let response = self
            .client
            .post(format!("{}/b/{}/o", UPLOAD_BASE, uri.bucket()))
            .query(&[("uploadType", "resumable"), ("name", uri.path())])
            .bearer_auth(token)
            .header("X-Upload-Content-Type", "application/x-ndjson")
            .json(&serde_json::json!({ "contentType": "application/x-ndjson" }))
            .send()
            .await
            .map_err(|e| PipelineError::transient(SERVICE, e))?;
        let response = ensure_success(response, SERVICE).await?;

        let session_url = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                PipelineError::transient(SERVICE, "resumable upload returned no session location")
            })?
            .to_string();

        Ok(Box::new(GcsWriter {
            client: self.client.clone(),
            auth: self.auth.clone(),
            uri: uri.clone(),
            session_url,
            buffer: Vec::with_capacity(CHUNK_SIZE),
            offset: 0,
        }))
    }

    async fn list(&self, prefix: &StorageUri) -> Result<Vec<StorageUri>, PipelineError> {
        let prefix = prefix.as_prefix();
        let mut found = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.auth.token().await?;
            let mut request = self
                .client
                .get(format!("{}/b/{}/o", API_BASE, prefix.bucket()))
                .bearer_auth(token)
                .query(&[("prefix", prefix.path()), ("fields", "items(name),nextPageToken")]);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| PipelineError::transient(SERVICE, e))?;
            let page: ListResponse = ensure_success(response, SERVICE)
                .await?
                .json()
                .await
                .map_err(|e| PipelineError::transient(SERVICE, e))?;

            for item in page.items {
                // folder placeholders
                if item.name.ends_with('/') {
                    continue;
                }
                found.push(StorageUri::parse(&format!(
                    "{}://{}/{}",
                    SCHEME,
                    prefix.bucket(),
                    item.name
                ))?);
            }

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(found)
    }

    async fn exists(&self, uri: &StorageUri) -> Result<bool, PipelineError> {
        let token = self.auth.token().await?;
        let response = self
            .client
            .get(object_url(uri))
            .query(&[("fields", "name")])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| PipelineError::transient(SERVICE, e))?;

        if is_not_found(response.status()) {
            return Ok(false);
        }
        ensure_success(response, SERVICE).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_encodes_path() {
        let uri = StorageUri::parse("gs://catalog/runs/r 1/export/content.jsonl").unwrap();
        assert_eq!(
            object_url(&uri),
            "https://storage.googleapis.com/storage/v1/b/catalog/o/runs%2Fr%201%2Fexport%2Fcontent.jsonl"
        );
    }

    #[test]
    fn test_chunk_size_is_resumable_multiple() {
        assert_eq!(CHUNK_SIZE % (256 * 1024), 0);
    }
}
