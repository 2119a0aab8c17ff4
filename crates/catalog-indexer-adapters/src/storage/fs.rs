//! Local filesystem object store
//!
//! `file://bucket/a/b.jsonl` maps to `<root>/bucket/a/b.jsonl`. Writes go to a
//! sibling `.partial` file that is renamed into place on `finish`, so readers
//! never observe a half-written object.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};

use catalog_indexer::{ObjectReader, ObjectStore, ObjectWriter, PipelineError, StorageUri};

const SCHEME: &str = "file";
const PARTIAL_SUFFIX: &str = ".partial";

fn io_error(path: &Path, e: std::io::Error) -> PipelineError {
    PipelineError::transient("filesystem", format!("{}: {}", path.display(), e))
}

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn local_path(&self, uri: &StorageUri) -> Result<PathBuf, PipelineError> {
        if uri.scheme() != SCHEME {
            return Err(PipelineError::InvalidUri(uri.to_string()));
        }
        let mut path = self.root.join(uri.bucket());
        for segment in uri.path().split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        Ok(path)
    }
}

struct FsWriter {
    target: PathBuf,
    partial: PathBuf,
    file: BufWriter<fs::File>,
    bytes: u64,
}

#[async_trait]
impl ObjectWriter for FsWriter {
    async fn write_line(&mut self, line: &str) -> Result<(), PipelineError> {
        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| io_error(&self.partial, e))?;
        self.file
            .write_all(b"\n")
            .await
            .map_err(|e| io_error(&self.partial, e))?;
        self.bytes += line.len() as u64 + 1;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> Result<u64, PipelineError> {
        let mut this = *self;
        this.file
            .flush()
            .await
            .map_err(|e| io_error(&this.partial, e))?;
        fs::rename(&this.partial, &this.target)
            .await
            .map_err(|e| io_error(&this.target, e))?;
        Ok(this.bytes)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn supports(&self, uri: &StorageUri) -> bool {
        uri.scheme() == SCHEME
    }

    async fn open_reader(&self, uri: &StorageUri) -> Result<ObjectReader, PipelineError> {
        let path = self.local_path(uri)?;
        let file = fs::File::open(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::ObjectNotFound(uri.to_string()),
            _ => io_error(&path, e),
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    async fn create_writer(
        &self,
        uri: &StorageUri,
    ) -> Result<Box<dyn ObjectWriter>, PipelineError> {
        let target = self.local_path(uri)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let mut partial = target.clone().into_os_string();
        partial.push(PARTIAL_SUFFIX);
        let partial = PathBuf::from(partial);
        let file = fs::File::create(&partial)
            .await
            .map_err(|e| io_error(&partial, e))?;

        Ok(Box::new(FsWriter {
            target,
            partial,
            file: BufWriter::new(file),
            bytes: 0,
        }))
    }

    async fn list(&self, prefix: &StorageUri) -> Result<Vec<StorageUri>, PipelineError> {
        let bucket_root = self.root.join(prefix.bucket());
        let dir = self.local_path(&prefix.as_prefix())?;
        let mut found = Vec::new();
        let mut pending = vec![dir];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(io_error(&dir, e)),
            };

            while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(&dir, e))? {
                let path = entry.path();
                let file_type = entry.file_type().await.map_err(|e| io_error(&path, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                if path.to_string_lossy().ends_with(PARTIAL_SUFFIX) {
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&bucket_root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                found.push(StorageUri::parse(&format!(
                    "{}://{}/{}",
                    SCHEME,
                    prefix.bucket(),
                    key
                ))?);
            }
        }

        found.sort();
        Ok(found)
    }

    async fn exists(&self, uri: &StorageUri) -> Result<bool, PipelineError> {
        let path = self.local_path(uri)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;

    fn uri(s: &str) -> StorageUri {
        StorageUri::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let target = uri("file://bucket/runs/r1/export/content.jsonl");

        let mut writer = store.create_writer(&target).await.unwrap();
        writer.write_line(r#"{"content":"a"}"#).await.unwrap();
        writer.write_line(r#"{"content":"b"}"#).await.unwrap();
        assert!(!store.exists(&target).await.unwrap());
        let bytes = writer.finish().await.unwrap();
        assert_eq!(bytes, 32);

        assert!(dir.path().join("bucket/runs/r1/export/content.jsonl").is_file());
        let mut lines = store.open_reader(&target).await.unwrap().lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"{"content":"a"}"#);
        assert_eq!(lines.next_line().await.unwrap().unwrap(), r#"{"content":"b"}"#);
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_is_recursive_and_skips_partial_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        for name in [
            "file://bucket/emb/model-1/predictions_00002.jsonl",
            "file://bucket/emb/model-1/predictions_00001.jsonl",
            "file://bucket/other/x.jsonl",
        ] {
            let w = store.create_writer(&uri(name)).await.unwrap();
            w.finish().await.unwrap();
        }
        // unfinished writer leaves only a partial file behind
        let _pending = store
            .create_writer(&uri("file://bucket/emb/model-1/predictions_00003.jsonl"))
            .await
            .unwrap();

        let listed = store.list(&uri("file://bucket/emb")).await.unwrap();
        assert_eq!(
            listed.iter().map(|u| u.to_string()).collect::<Vec<_>>(),
            vec![
                "file://bucket/emb/model-1/predictions_00001.jsonl",
                "file://bucket/emb/model-1/predictions_00002.jsonl",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_object_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());

        let err = store
            .open_reader(&uri("file://bucket/missing.jsonl"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::ObjectNotFound(_)));
        assert!(store.list(&uri("file://bucket/nothing/")).await.unwrap().is_empty());
        assert!(!store.supports(&uri("gs://bucket/x")));
    }
}
