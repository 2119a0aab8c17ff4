//! Catalog Read Port
//!
//! Owned by the catalog service; consumed here read-only.

use async_trait::async_trait;

use crate::domain::entities::CatalogItem;
use crate::domain::errors::PipelineError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// One page of active items, ordered by primary key. Pages are zero-based.
    async fn paged_query(&self, page: u32, page_size: u32)
        -> Result<Vec<CatalogItem>, PipelineError>;
}
