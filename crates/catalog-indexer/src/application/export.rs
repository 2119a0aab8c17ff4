//! Export stage - catalog to two position-aligned JSONL files

use std::sync::Arc;
use std::time::Instant;

use crate::domain::{
    CatalogItem, ContentRecord, ExportOutcome, MetadataRecord, RecordSkip, StageResult, StorageUri,
};
use crate::ports::{CatalogReader, ObjectStore};

/// Log individual skips up to this many, then only the total
const SKIP_LOG_LIMIT: u64 = 20;

pub struct ExportStage {
    catalog: Arc<dyn CatalogReader>,
    store: Arc<dyn ObjectStore>,
}

impl ExportStage {
    pub fn new(catalog: Arc<dyn CatalogReader>, store: Arc<dyn ObjectStore>) -> Self {
        Self { catalog, store }
    }

    /// Page through the catalog, writing line N of both files from item N.
    ///
    /// An item is written to both files or to neither.
    pub async fn export(
        &self,
        content_uri: &StorageUri,
        metadata_uri: &StorageUri,
        page_size: u32,
    ) -> StageResult<ExportOutcome> {
        let started = Instant::now();
        let page_size = page_size.max(1);

        let mut content = self.store.create_writer(content_uri).await?;
        let mut metadata = self.store.create_writer(metadata_uri).await?;

        let mut item_count = 0u64;
        let mut failed_count = 0u64;
        let mut page = 0u32;

        loop {
            let items = self.catalog.paged_query(page, page_size).await?;
            let fetched = items.len();
            tracing::debug!(page, fetched, "Fetched catalog page");

            for item in &items {
                match encode_pair(item) {
                    Ok((content_line, metadata_line)) => {
                        content.write_line(&content_line).await?;
                        metadata.write_line(&metadata_line).await?;
                        item_count += 1;
                    }
                    Err(skip) => {
                        failed_count += 1;
                        if failed_count <= SKIP_LOG_LIMIT {
                            tracing::warn!(item_id = %item.id, "Skipping catalog item: {}", skip);
                        }
                    }
                }
            }

            if fetched < page_size as usize {
                break;
            }
            page += 1;
        }

        content.finish().await?;
        metadata.finish().await?;

        if failed_count > SKIP_LOG_LIMIT {
            tracing::warn!(
                "{} catalog items skipped in total ({} logged)",
                failed_count,
                SKIP_LOG_LIMIT
            );
        }

        let outcome = ExportOutcome {
            content_uri: content_uri.clone(),
            metadata_uri: metadata_uri.clone(),
            item_count,
            failed_count,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "📦 Export completed: {} items, {} skipped, {} pages -> {}",
            outcome.item_count,
            outcome.failed_count,
            page + 1,
            outcome.content_uri
        );

        Ok(outcome)
    }
}

/// Both lines for one item, built before either is written
fn encode_pair(item: &CatalogItem) -> Result<(String, String), RecordSkip> {
    let content = ContentRecord::from_item(item)?;
    let metadata = MetadataRecord::from_item(item)?;
    let content_line = serde_json::to_string(&content)
        .map_err(|e| RecordSkip::MalformedMetadata(e.to_string()))?;
    let metadata_line = serde_json::to_string(&metadata)
        .map_err(|e| RecordSkip::MalformedMetadata(e.to_string()))?;
    Ok((content_line, metadata_line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PipelineError;
    use crate::ports::MockCatalogReader;
    use crate::testing::{MemoryObjectStore, StaticCatalog};

    fn item(id: &str, name: &str) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            name: name.to_string(),
            brand: Some("Acme".to_string()),
            price: Some(10.0),
            ..Default::default()
        }
    }

    fn uris() -> (StorageUri, StorageUri) {
        (
            StorageUri::parse("mem://b/export/content.jsonl").unwrap(),
            StorageUri::parse("mem://b/export/metadata.jsonl").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_export_keeps_files_aligned_and_skips_empty_items() {
        let store = Arc::new(MemoryObjectStore::new());
        let catalog = Arc::new(StaticCatalog::new(vec![
            item("p1", "Widget"),
            item("", "No id"),
            CatalogItem {
                id: "p3".into(),
                ..Default::default()
            },
            item("p4", "Gadget"),
        ]));
        let stage = ExportStage::new(catalog, store.clone());
        let (content_uri, metadata_uri) = uris();

        let outcome = stage.export(&content_uri, &metadata_uri, 2).await.unwrap();

        assert_eq!(outcome.item_count, 2);
        assert_eq!(outcome.failed_count, 2);

        let content = store.lines("mem://b/export/content.jsonl");
        let metadata = store.lines("mem://b/export/metadata.jsonl");
        assert_eq!(content.len(), metadata.len());
        assert_eq!(content[0], r#"{"content":"Widget. Brand: Acme"}"#);
        assert_eq!(metadata[0], r#"{"id":"p1","brand":"Acme","price":10.0}"#);
        assert!(metadata[1].contains(r#""id":"p4""#));
    }

    #[tokio::test]
    async fn test_export_stops_on_short_page() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut catalog = MockCatalogReader::new();
        catalog
            .expect_paged_query()
            .withf(|page, size| *page == 0 && *size == 2)
            .times(1)
            .returning(|_, _| Ok(vec![item("a", "A"), item("b", "B")]));
        catalog
            .expect_paged_query()
            .withf(|page, _| *page == 1)
            .times(1)
            .returning(|_, _| Ok(vec![item("c", "C")]));

        let stage = ExportStage::new(Arc::new(catalog), store.clone());
        let (content_uri, metadata_uri) = uris();
        let outcome = stage.export(&content_uri, &metadata_uri, 2).await.unwrap();

        assert_eq!(outcome.item_count, 3);
        assert_eq!(store.lines("mem://b/export/content.jsonl").len(), 3);
    }

    #[tokio::test]
    async fn test_catalog_failure_aborts_export() {
        let store = Arc::new(MemoryObjectStore::new());
        let mut catalog = MockCatalogReader::new();
        catalog
            .expect_paged_query()
            .returning(|_, _| Err(PipelineError::transient("catalog", "connection refused")));

        let stage = ExportStage::new(Arc::new(catalog), store.clone());
        let (content_uri, metadata_uri) = uris();
        let err = stage.export(&content_uri, &metadata_uri, 10).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(store.get("mem://b/export/content.jsonl").is_none());
    }
}
