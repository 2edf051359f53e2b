//! In-memory catalog backed by a JSON export
//!
//! Mirrors the query semantics of the hosted document store: equality
//! filters return documents in storage order, range filters return documents
//! ordered by the filtered field.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use super::{CatalogError, CatalogField, CatalogStore, CigarRecord};

/// Catalog held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    records: Vec<CigarRecord>,
}

impl InMemoryCatalog {
    /// Create a catalog from records, deriving any missing lookup fields
    pub fn new(records: Vec<CigarRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(CigarRecord::with_derived_fields)
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn find_equal(
        &self,
        field: CatalogField,
        value: &str,
        limit: usize,
    ) -> Result<Vec<CigarRecord>, CatalogError> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.field(field) == value)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_range(
        &self,
        field: CatalogField,
        start: &str,
        end: &str,
        limit: usize,
    ) -> Result<Vec<CigarRecord>, CatalogError> {
        if start > end {
            return Err(CatalogError::InvalidQuery(format!(
                "range start {:?} is after end {:?} on {}",
                start, end, field
            )));
        }

        let mut matches: Vec<&CigarRecord> = self
            .records
            .iter()
            .filter(|record| {
                let value = record.field(field);
                value >= start && value < end
            })
            .collect();

        // Stable sort keeps storage order among equal values
        matches.sort_by(|a, b| a.field(field).cmp(b.field(field)));

        Ok(matches.into_iter().take(limit).cloned().collect())
    }
}

/// Load a catalog from a JSON file containing an array of records
pub fn load_catalog(path: &Path) -> Result<InMemoryCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog {:?}", path))?;
    let records: Vec<CigarRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog {:?}", path))?;

    let catalog = InMemoryCatalog::new(records);
    info!("Loaded {} cigars from {:?}", catalog.len(), path);
    Ok(catalog)
}
