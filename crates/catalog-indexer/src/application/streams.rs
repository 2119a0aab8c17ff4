//! Lazily-advanced line sources over object storage
//!
//! Both sources hold one open reader and one line at a time.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, Lines};

use crate::domain::{PipelineError, StageResult, StorageUri};
use crate::ports::{ObjectReader, ObjectStore};

/// Sequential non-blank lines of one object
pub struct LineStream {
    uri: StorageUri,
    lines: Lines<ObjectReader>,
}

impl LineStream {
    pub async fn open(store: &dyn ObjectStore, uri: &StorageUri) -> StageResult<Self> {
        let reader = store.open_reader(uri).await?;
        Ok(Self {
            uri: uri.clone(),
            lines: reader.lines(),
        })
    }

    pub fn uri(&self) -> &StorageUri {
        &self.uri
    }

    /// Next non-blank line, or `None` at end of object
    pub async fn next_line(&mut self) -> StageResult<Option<String>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| PipelineError::transient("object storage", format!("{}: {}", self.uri, e)))?;
            match line {
                Some(l) if l.trim().is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    /// Consume the rest of the object, returning how many lines were left
    pub async fn count_remaining(&mut self) -> StageResult<u64> {
        let mut count = 0;
        while self.next_line().await?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

/// One continuous line sequence over an ordered list of shards
///
/// A shard is opened only after the previous one is exhausted.
pub struct ShardedLineStream {
    store: Arc<dyn ObjectStore>,
    pending: VecDeque<StorageUri>,
    current: Option<LineStream>,
}

impl ShardedLineStream {
    pub fn new(store: Arc<dyn ObjectStore>, shards: Vec<StorageUri>) -> Self {
        Self {
            store,
            pending: shards.into(),
            current: None,
        }
    }

    pub async fn next_line(&mut self) -> StageResult<Option<String>> {
        loop {
            if self.current.is_none() {
                let Some(shard) = self.pending.pop_front() else {
                    return Ok(None);
                };
                tracing::debug!(shard = %shard, "Opening embedding shard");
                self.current = Some(LineStream::open(self.store.as_ref(), &shard).await?);
            }

            if let Some(stream) = self.current.as_mut() {
                match stream.next_line().await? {
                    Some(line) => return Ok(Some(line)),
                    None => self.current = None,
                }
            }
        }
    }

    pub async fn count_remaining(&mut self) -> StageResult<u64> {
        let mut count = 0;
        while self.next_line().await?.is_some() {
            count += 1;
        }
        Ok(count)
    }
}

/// Whether a file under the embedding prefix is an output shard
pub fn is_shard_file(file_name: &str) -> bool {
    if file_name.is_empty() || file_name.contains("error") {
        return false;
    }
    file_name.ends_with(".jsonl") || file_name.starts_with("prediction")
}

/// Shards of one job output under `prefix`, sorted by file name ascending
/// (ties by full URI). This order reconstructs submission order across shard
/// boundaries.
///
/// Each submission writes into its own timestamped directory, so a resubmitted
/// job leaves several outputs under the same prefix. Only the directory that
/// sorts last (the newest) is read; shards are never mixed across outputs.
pub async fn discover_shards(
    store: &dyn ObjectStore,
    prefix: &StorageUri,
) -> StageResult<Vec<StorageUri>> {
    let mut shards: Vec<StorageUri> = store
        .list(&prefix.as_prefix())
        .await?
        .into_iter()
        .filter(|uri| is_shard_file(uri.file_name()))
        .collect();

    let outputs: BTreeSet<StorageUri> = shards.iter().map(StorageUri::parent).collect();
    if let Some(newest) = outputs.last() {
        if outputs.len() > 1 {
            tracing::warn!(
                "⚠️ Found {} job outputs under {}, reading only {}",
                outputs.len(),
                prefix,
                newest
            );
        }
        shards.retain(|uri| uri.parent() == *newest);
    }

    shards.sort_by(|a, b| a.file_name().cmp(b.file_name()).then_with(|| a.cmp(b)));
    Ok(shards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryObjectStore;

    fn uri(s: &str) -> StorageUri {
        StorageUri::parse(s).unwrap()
    }

    #[test]
    fn test_shard_recognition() {
        assert!(is_shard_file("predictions_00001.jsonl"));
        assert!(is_shard_file("prediction.results-00000-of-00002"));
        assert!(!is_shard_file("prediction.errors_stats-00000-of-00001"));
        assert!(!is_shard_file("errors_00001.jsonl"));
        assert!(!is_shard_file("_SUCCESS"));
        assert!(!is_shard_file(""));
    }

    #[tokio::test]
    async fn test_line_stream_skips_blank_lines() {
        let store = MemoryObjectStore::new();
        store.put("mem://b/m.jsonl", "a\n\n  \nb\n");
        let mut stream = LineStream::open(&store, &uri("mem://b/m.jsonl")).await.unwrap();
        assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("a"));
        assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("b"));
        assert_eq!(stream.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sharded_stream_crosses_shard_boundaries_in_sorted_order() {
        let store = Arc::new(MemoryObjectStore::new());
        // inserted out of order on purpose
        store.put("mem://b/emb/predictions_00002.jsonl", "c\nd\n");
        store.put("mem://b/emb/predictions_00001.jsonl", "a\nb\n");
        store.put("mem://b/emb/prediction.errors_stats-00000-of-00001", "x\n");

        let shards = discover_shards(store.as_ref(), &uri("mem://b/emb/")).await.unwrap();
        assert_eq!(
            shards.iter().map(|s| s.file_name()).collect::<Vec<_>>(),
            vec!["predictions_00001.jsonl", "predictions_00002.jsonl"]
        );

        let mut stream = ShardedLineStream::new(store.clone(), shards);
        let mut seen = Vec::new();
        while let Some(line) = stream.next_line().await.unwrap() {
            seen.push(line);
        }
        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_resubmitted_job_outputs_are_not_mixed() {
        let store = Arc::new(MemoryObjectStore::new());
        let older = "mem://b/emb/prediction-model-2026-01-18T09:00:00.000Z";
        let newer = "mem://b/emb/prediction-model-2026-01-18T11:00:00.000Z";
        for dir in [older, newer] {
            store.put(&format!("{}/prediction.results-00000-of-00002", dir), "a\nb\n");
            store.put(&format!("{}/prediction.results-00001-of-00002", dir), "c\nd\n");
        }

        let shards = discover_shards(store.as_ref(), &uri("mem://b/emb/")).await.unwrap();
        assert_eq!(
            shards.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            vec![
                format!("{}/prediction.results-00000-of-00002", newer),
                format!("{}/prediction.results-00001-of-00002", newer),
            ]
        );

        let mut stream = ShardedLineStream::new(store.clone(), shards);
        let mut seen = Vec::new();
        while let Some(line) = stream.next_line().await.unwrap() {
            seen.push(line);
        }
        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_empty_shard_is_passed_over() {
        let store = Arc::new(MemoryObjectStore::new());
        store.put("mem://b/emb/predictions_00001.jsonl", "a\n");
        store.put("mem://b/emb/predictions_00002.jsonl", "\n");
        store.put("mem://b/emb/predictions_00003.jsonl", "b\n");
        let shards = discover_shards(store.as_ref(), &uri("mem://b/emb")).await.unwrap();
        let mut stream = ShardedLineStream::new(store.clone(), shards);
        assert_eq!(stream.next_line().await.unwrap().as_deref(), Some("a"));
        assert_eq!(stream.count_remaining().await.unwrap(), 1);
    }
}
