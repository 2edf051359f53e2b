//! Cigar Catalog
//!
//! Read-only access to the catalog of known cigars. The resolver only needs
//! two query shapes: exact equality on a field and a lexicographic range on
//! a field (used for prefix search). Stores are reached through the
//! [`CatalogStore`] trait so the hosted document database and the local
//! JSON catalog are interchangeable.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub use memory::{load_catalog, InMemoryCatalog};

/// Upper bound appended to a prefix to build a range covering every value
/// that starts with it
pub const HIGH_SENTINEL: char = '\u{f8ff}';

/// A cigar as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CigarRecord {
    /// Document identifier
    pub id: String,
    /// Display name, title-cased ("Henry Clay War Hawk")
    pub name: String,
    /// Lower-cased copy of `name` for case-insensitive lookups
    #[serde(default)]
    pub name_insensitive: String,
    /// Brand name, title-cased
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub wrapper: Option<String>,
    #[serde(default)]
    pub strength: Option<String>,
    #[serde(default)]
    pub binder: Option<String>,
    #[serde(default)]
    pub filler: Option<String>,
    #[serde(default)]
    pub vitola: Option<String>,
    /// Average community rating
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Any other free-text fields carried by the catalog document
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CigarRecord {
    /// Create a record with only the searchable fields populated
    pub fn new(id: impl Into<String>, name: impl Into<String>, brand: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            name_insensitive: name.to_lowercase(),
            name,
            brand: brand.into(),
            manufacturer: None,
            origin: None,
            wrapper: None,
            strength: None,
            binder: None,
            filler: None,
            vitola: None,
            rating: None,
            review_count: 0,
            description: None,
            image_url: None,
            extra: BTreeMap::new(),
        }
    }

    /// Fill fields the catalog may omit
    pub fn with_derived_fields(mut self) -> Self {
        if self.name_insensitive.is_empty() {
            self.name_insensitive = self.name.to_lowercase();
        }
        self
    }

    /// Value of a searchable field
    pub fn field(&self, field: CatalogField) -> &str {
        match field {
            CatalogField::Name => &self.name,
            CatalogField::NameInsensitive => &self.name_insensitive,
            CatalogField::Brand => &self.brand,
        }
    }
}

/// Fields the resolver queries on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogField {
    Name,
    NameInsensitive,
    Brand,
}

impl CatalogField {
    /// Field name as stored in catalog documents
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogField::Name => "name",
            CatalogField::NameInsensitive => "name_insensitive",
            CatalogField::Brand => "brand",
        }
    }
}

impl std::fmt::Display for CatalogField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog query failures
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Access control rejected the query
    #[error("permission denied reading catalog: {0}")]
    PermissionDenied(String),

    /// The store could not be reached or failed to answer
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("invalid catalog query: {0}")]
    InvalidQuery(String),
}

/// Read-only query interface over the cigar catalog
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Records whose `field` equals `value` exactly, at most `limit`
    async fn find_equal(
        &self,
        field: CatalogField,
        value: &str,
        limit: usize,
    ) -> Result<Vec<CigarRecord>, CatalogError>;

    /// Records with `start <= field < end`, ordered by `field`, at most `limit`
    async fn find_range(
        &self,
        field: CatalogField,
        start: &str,
        end: &str,
        limit: usize,
    ) -> Result<Vec<CigarRecord>, CatalogError>;

    /// Records whose `field` starts with `prefix`, at most `limit`
    async fn find_prefix(
        &self,
        field: CatalogField,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<CigarRecord>, CatalogError> {
        let end = format!("{prefix}{HIGH_SENTINEL}");
        self.find_range(field, prefix, &end, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserialize_minimal() {
        let json = r#"{"id": "hc-1", "name": "Henry Clay War Hawk", "brand": "Henry Clay"}"#;
        let record: CigarRecord = serde_json::from_str(json).unwrap();
        let record = record.with_derived_fields();

        assert_eq!(record.name_insensitive, "henry clay war hawk");
        assert_eq!(record.review_count, 0);
        assert!(record.rating.is_none());
        assert!(record.extra.is_empty());
    }

    #[test]
    fn test_record_keeps_free_text_fields() {
        let json = r#"{
            "id": "pd-1",
            "name": "Padron 1964 Anniversary",
            "name_insensitive": "padron 1964 anniversary",
            "brand": "Padron",
            "rating": 4.6,
            "review_count": 12,
            "tasting_notes": "cocoa, espresso"
        }"#;
        let record: CigarRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.review_count, 12);
        assert_eq!(
            record.extra.get("tasting_notes").and_then(|v| v.as_str()),
            Some("cocoa, espresso")
        );
    }

    #[test]
    fn test_record_field_access() {
        let record = CigarRecord::new("1", "Henry Clay War Hawk", "Henry Clay");
        assert_eq!(record.field(CatalogField::Name), "Henry Clay War Hawk");
        assert_eq!(record.field(CatalogField::NameInsensitive), "henry clay war hawk");
        assert_eq!(record.field(CatalogField::Brand), "Henry Clay");
        assert_eq!(CatalogField::NameInsensitive.to_string(), "name_insensitive");
    }
}
