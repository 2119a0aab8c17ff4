//! PostgreSQL implementation of CatalogReader

use async_trait::async_trait;
use sqlx::PgPool;

use catalog_indexer::{CatalogItem, CatalogReader, PipelineError};

/// Active products with their category name, in primary-key order so pages
/// stay stable while the export walks them
const PAGE_QUERY: &str = r#"
    SELECT
        p.id::text          AS id,
        p.name              AS name,
        p.description       AS description,
        p.brand             AS brand,
        p.category_id::text AS category_id,
        c.name              AS category_name,
        p.price::float8     AS price,
        p.rating::float8    AS rating
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
    WHERE p.is_active
    ORDER BY p.id
    LIMIT $1 OFFSET $2
"#;

pub struct PgCatalogReader {
    pool: PgPool,
}

impl PgCatalogReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    description: Option<String>,
    brand: Option<String>,
    category_id: Option<String>,
    category_name: Option<String>,
    price: Option<f64>,
    rating: Option<f64>,
}

impl From<ProductRow> for CatalogItem {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            brand: row.brand,
            category_id: row.category_id,
            category_name: row.category_name,
            price: row.price,
            rating: row.rating,
        }
    }
}

#[async_trait]
impl CatalogReader for PgCatalogReader {
    async fn paged_query(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<CatalogItem>, PipelineError> {
        let offset = i64::from(page) * i64::from(page_size);
        let rows = sqlx::query_as::<_, ProductRow>(PAGE_QUERY)
            .bind(i64::from(page_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PipelineError::transient("catalog database", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
