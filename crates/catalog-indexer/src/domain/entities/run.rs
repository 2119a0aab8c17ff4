//! Run paths - fixed naming convention under a base URI
//!
//! Every location a run touches is derived from the base URI and the run id,
//! so any stage can be re-invoked later with only the run id.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{RunId, StorageUri};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPaths {
    pub run_id: RunId,
    pub content_uri: StorageUri,
    pub metadata_uri: StorageUri,
    pub embeddings_prefix: StorageUri,
    pub vectors_uri: StorageUri,
    pub record_uri: StorageUri,
}

impl RunPaths {
    pub fn derive(base: &StorageUri, run_id: &RunId) -> Self {
        let root = base.as_prefix().join(&format!("runs/{}/", run_id));
        Self {
            run_id: run_id.clone(),
            content_uri: root.join("export/content.jsonl"),
            metadata_uri: root.join("export/metadata.jsonl"),
            embeddings_prefix: root.join("embeddings/"),
            vectors_uri: root.join("vectors/datapoints.jsonl"),
            record_uri: root.join("result.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_namespaced_by_run() {
        let base = StorageUri::parse("gs://catalog-vectors/pipeline").unwrap();
        let run = RunId::parse("r-1").unwrap();
        let paths = RunPaths::derive(&base, &run);

        assert_eq!(
            paths.content_uri.to_string(),
            "gs://catalog-vectors/pipeline/runs/r-1/export/content.jsonl"
        );
        assert_eq!(
            paths.metadata_uri.to_string(),
            "gs://catalog-vectors/pipeline/runs/r-1/export/metadata.jsonl"
        );
        assert_eq!(
            paths.embeddings_prefix.to_string(),
            "gs://catalog-vectors/pipeline/runs/r-1/embeddings/"
        );
        assert_eq!(
            paths.vectors_uri.to_string(),
            "gs://catalog-vectors/pipeline/runs/r-1/vectors/datapoints.jsonl"
        );
        assert_eq!(
            paths.record_uri.to_string(),
            "gs://catalog-vectors/pipeline/runs/r-1/result.json"
        );
    }

    #[test]
    fn test_same_run_id_derives_same_paths() {
        let base = StorageUri::parse("file://local/").unwrap();
        let run = RunId::parse("nightly").unwrap();
        assert_eq!(RunPaths::derive(&base, &run), RunPaths::derive(&base, &run));
        let other = RunPaths::derive(&base, &RunId::parse("other").unwrap());
        assert_ne!(RunPaths::derive(&base, &run).content_uri, other.content_uri);
    }
}
