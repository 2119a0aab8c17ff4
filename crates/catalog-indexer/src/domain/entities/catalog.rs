//! Catalog items and the two export records built from each one

use serde::{Deserialize, Serialize};

use crate::domain::errors::RecordSkip;

/// One product as returned by the catalog read interface
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub price: Option<f64>,
    pub rating: Option<f64>,
}

/// Content-file line: the text submitted for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub content: String,
}

/// Metadata-file line: id plus the attributes restricts are derived from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl ContentRecord {
    /// Text to embed: name, description, brand and category, in that order
    pub fn from_item(item: &CatalogItem) -> Result<Self, RecordSkip> {
        if item.id.trim().is_empty() {
            return Err(RecordSkip::MissingId);
        }

        let mut parts: Vec<String> = Vec::with_capacity(4);
        if let Some(name) = present(Some(item.name.as_str())) {
            parts.push(name.to_string());
        }
        if let Some(description) = present(item.description.as_deref()) {
            parts.push(description.to_string());
        }
        if let Some(brand) = present(item.brand.as_deref()) {
            parts.push(format!("Brand: {}", brand));
        }
        if let Some(category) = present(item.category_name.as_deref()) {
            parts.push(format!("Category: {}", category));
        }

        if parts.is_empty() {
            return Err(RecordSkip::EmptyContent(item.id.clone()));
        }

        Ok(Self {
            content: parts.join(". "),
        })
    }
}

impl MetadataRecord {
    pub fn from_item(item: &CatalogItem) -> Result<Self, RecordSkip> {
        let id = item.id.trim();
        if id.is_empty() {
            return Err(RecordSkip::MissingId);
        }

        Ok(Self {
            id: id.to_string(),
            category_id: present(item.category_id.as_deref()).map(str::to_string),
            brand: present(item.brand.as_deref()).map(str::to_string),
            price: item.price,
            rating: item.rating,
        })
    }
}
