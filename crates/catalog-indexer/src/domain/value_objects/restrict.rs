//! Restricts - Filter attributes attached to vector datapoints
//!
//! Each metadata field that can become a restrict is one variant of
//! [`RestrictField`] with its own mapping; there is no string dispatch.

use serde::{Deserialize, Serialize};

use crate::domain::entities::MetadataRecord;

/// Categorical allow-list restrict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalRestrict {
    pub namespace: String,
    pub allow: Vec<String>,
}

/// Numeric scalar restrict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericRestrict {
    pub namespace: String,
    pub value_float: f64,
}

/// A restrict derived from one metadata field
#[derive(Debug, Clone, PartialEq)]
pub enum Restrict {
    Categorical(CategoricalRestrict),
    Numeric(NumericRestrict),
}

/// Metadata fields that map onto restricts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictField {
    CategoryId,
    Brand,
    Price,
    Rating,
}

impl RestrictField {
    /// Derivation order; fixes the serialized order of restricts
    pub const ALL: [RestrictField; 4] = [
        RestrictField::CategoryId,
        RestrictField::Brand,
        RestrictField::Price,
        RestrictField::Rating,
    ];

    pub fn namespace(&self) -> &'static str {
        match self {
            RestrictField::CategoryId => "category_id",
            RestrictField::Brand => "brand",
            RestrictField::Price => "price",
            RestrictField::Rating => "rating",
        }
    }

    /// Build this field's restrict, if the record carries the field
    pub fn restrict(&self, record: &MetadataRecord) -> Option<Restrict> {
        match self {
            RestrictField::CategoryId => categorical(self.namespace(), record.category_id.as_deref()),
            RestrictField::Brand => categorical(self.namespace(), record.brand.as_deref()),
            RestrictField::Price => numeric(self.namespace(), record.price),
            RestrictField::Rating => numeric(self.namespace(), record.rating),
        }
    }
}

fn categorical(namespace: &str, value: Option<&str>) -> Option<Restrict> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    Some(Restrict::Categorical(CategoricalRestrict {
        namespace: namespace.to_string(),
        allow: vec![value.to_string()],
    }))
}

fn numeric(namespace: &str, value: Option<f64>) -> Option<Restrict> {
    let value = value.filter(|v| v.is_finite())?;
    Some(Restrict::Numeric(NumericRestrict {
        namespace: namespace.to_string(),
        value_float: value,
    }))
}

/// Split a record's restricts into the two lists the index expects
pub fn derive_restricts(record: &MetadataRecord) -> (Vec<CategoricalRestrict>, Vec<NumericRestrict>) {
    let mut categorical = Vec::new();
    let mut numeric = Vec::new();
    for field in RestrictField::ALL {
        match field.restrict(record) {
            Some(Restrict::Categorical(r)) => categorical.push(r),
            Some(Restrict::Numeric(r)) => numeric.push(r),
            None => {}
        }
    }
    (categorical, numeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MetadataRecord {
        MetadataRecord {
            id: "p1".into(),
            category_id: Some("42".into()),
            brand: Some("  ".into()),
            price: Some(19.5),
            rating: None,
        }
    }

    #[test]
    fn test_each_field_maps_independently() {
        let rec = record();
        assert_eq!(
            RestrictField::CategoryId.restrict(&rec),
            Some(Restrict::Categorical(CategoricalRestrict {
                namespace: "category_id".into(),
                allow: vec!["42".into()],
            }))
        );
        // blank brand is treated as absent
        assert_eq!(RestrictField::Brand.restrict(&rec), None);
        assert_eq!(
            RestrictField::Price.restrict(&rec),
            Some(Restrict::Numeric(NumericRestrict {
                namespace: "price".into(),
                value_float: 19.5,
            }))
        );
        assert_eq!(RestrictField::Rating.restrict(&rec), None);
    }

    #[test]
    fn test_non_finite_numbers_are_dropped() {
        let mut rec = record();
        rec.price = Some(f64::NAN);
        let (_, numeric) = derive_restricts(&rec);
        assert!(numeric.is_empty());
    }

    #[test]
    fn test_derive_restricts_keeps_field_order() {
        let rec = MetadataRecord {
            id: "p2".into(),
            category_id: Some("7".into()),
            brand: Some("Acme".into()),
            price: Some(3.0),
            rating: Some(4.5),
        };
        let (categorical, numeric) = derive_restricts(&rec);
        let names: Vec<_> = categorical.iter().map(|r| r.namespace.as_str()).collect();
        assert_eq!(names, vec!["category_id", "brand"]);
        let names: Vec<_> = numeric.iter().map(|r| r.namespace.as_str()).collect();
        assert_eq!(names, vec!["price", "rating"]);
    }
}
