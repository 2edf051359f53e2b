//! Tiered catalog resolution
//!
//! A candidate string is resolved by trying progressively looser strategies
//! and stopping at the first hit:
//!
//! 1. exact match on `name`, then on `name_insensitive`
//! 2. brand lookup for each brand/variant split, ranked by the variant
//! 3. prefix-range lookups on the leading tokens, ranked by the full phrase
//!
//! Lookup failures are soft (logged and treated as "no results") except for
//! authorization failures, which abort resolution.

use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::candidates::brand_variant_splits;
use super::normalize::{normalize, title_case, tokenize};
use super::scoring::{best_match, record_score, variant_score, ScoredMatch};
use crate::catalog::{CatalogError, CatalogField, CatalogStore, CigarRecord};
use crate::config::CatalogConfig;

/// Resolution failures that must reach the caller
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("catalog access denied: {0}")]
    PermissionDenied(String),
}

/// Strategy level that produced a match, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    BrandVariant,
    PrefixFuzzy,
}

/// A resolved record together with how it was found
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMatch {
    pub tier: MatchTier,
    pub matched: ScoredMatch,
}

/// Lookup caps used by the resolver
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Records fetched per brand lookup
    pub brand_lookup_limit: usize,
    /// Records fetched per prefix-range lookup
    pub prefix_lookup_limit: usize,
    /// Leading tokens used for prefix lookups
    pub prefix_token_count: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            brand_lookup_limit: 25,
            prefix_lookup_limit: 10,
            prefix_token_count: 3,
        }
    }
}

impl From<&CatalogConfig> for ResolverSettings {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            brand_lookup_limit: config.brand_lookup_limit,
            prefix_lookup_limit: config.prefix_lookup_limit,
            prefix_token_count: config.prefix_token_count,
        }
    }
}

/// Resolves candidate text to catalog records
#[derive(Clone)]
pub struct CatalogResolver {
    store: Arc<dyn CatalogStore>,
    settings: ResolverSettings,
}

impl CatalogResolver {
    /// Create a resolver with default lookup caps
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self::with_settings(store, ResolverSettings::default())
    }

    pub fn with_settings(store: Arc<dyn CatalogStore>, settings: ResolverSettings) -> Self {
        Self { store, settings }
    }

    /// Resolve text to a cigar, first in normalized form, then as given
    ///
    /// The raw second pass covers catalog names that normalization mangles
    /// (accented letters, punctuation). It is skipped when the raw text is
    /// already in normalized form.
    pub async fn resolve_to_cigar(&self, text: &str) -> Result<Option<CigarRecord>, ResolveError> {
        let normalized = normalize(text);
        if !normalized.is_empty() {
            if let Some(record) = self.resolve(&normalized).await? {
                return Ok(Some(record));
            }
        }

        let raw = text.trim();
        if raw.is_empty() || raw == normalized {
            return Ok(None);
        }

        debug!("No match for {:?}, retrying with raw text {:?}", normalized, raw);
        self.resolve(raw).await
    }

    /// Resolve a single candidate string
    pub async fn resolve(&self, candidate: &str) -> Result<Option<CigarRecord>, ResolveError> {
        Ok(self
            .resolve_scored(candidate)
            .await?
            .map(|resolved| resolved.matched.record))
    }

    /// Resolve a single candidate string, reporting the tier and score
    pub async fn resolve_scored(
        &self,
        candidate: &str,
    ) -> Result<Option<ResolvedMatch>, ResolveError> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Ok(None);
        }

        let tokens = tokenize(candidate);
        let phrase = tokens.join(" ");

        let tiers = [MatchTier::Exact, MatchTier::BrandVariant, MatchTier::PrefixFuzzy];
        for tier in tiers {
            let found = match tier {
                MatchTier::Exact => self.exact_tier(candidate, &phrase, &tokens).await?,
                MatchTier::BrandVariant => self.brand_variant_tier(&tokens).await?,
                MatchTier::PrefixFuzzy => self.prefix_fuzzy_tier(&phrase, &tokens).await?,
            };

            if let Some(matched) = found {
                info!(
                    "Resolved {:?} to {:?} ({:?}, score {})",
                    candidate, matched.record.name, tier, matched.score
                );
                return Ok(Some(ResolvedMatch { tier, matched }));
            }
        }

        debug!("No catalog match for {:?}", candidate);
        Ok(None)
    }

    async fn exact_tier(
        &self,
        candidate: &str,
        phrase: &str,
        tokens: &[String],
    ) -> Result<Option<ScoredMatch>, ResolveError> {
        let lowercase = candidate.to_lowercase();
        let lookups = [
            (CatalogField::Name, candidate),
            (CatalogField::NameInsensitive, lowercase.as_str()),
        ];

        for (field, value) in lookups {
            let found = self.lookup_equal(field, value, 1).await?;
            if let Some(record) = found.into_iter().next() {
                // Score against the exact text so a hit is always positive
                let score = record_score(&record, phrase, tokens)
                    .max(record_score(&record, candidate, &[]));
                if score > 0 {
                    return Ok(Some(ScoredMatch { record, score }));
                }
            }
        }

        Ok(None)
    }

    async fn brand_variant_tier(
        &self,
        tokens: &[String],
    ) -> Result<Option<ScoredMatch>, ResolveError> {
        for split in brand_variant_splits(tokens) {
            let brand = title_case(&split.brand);
            let variant_phrase = split.variant_phrase();

            let records = self
                .lookup_equal(CatalogField::Brand, &brand, self.settings.brand_lookup_limit)
                .await?;
            if records.is_empty() {
                continue;
            }

            let best = best_match(records.into_iter().map(|record| {
                let score = variant_score(&record, &variant_phrase, &split.variant);
                ScoredMatch { record, score }
            }));

            if best.is_some() {
                return Ok(best);
            }
            debug!("Brand {:?} found but no variant matched {:?}", brand, variant_phrase);
        }

        Ok(None)
    }

    async fn prefix_fuzzy_tier(
        &self,
        phrase: &str,
        tokens: &[String],
    ) -> Result<Option<ScoredMatch>, ResolveError> {
        let mut seen = HashSet::new();
        let mut pool = Vec::new();

        for token in tokens.iter().take(self.settings.prefix_token_count) {
            let cased = title_case(token);
            let lowercase = token.to_lowercase();
            let lookups = [
                (CatalogField::Name, cased.as_str()),
                (CatalogField::Brand, cased.as_str()),
                (CatalogField::NameInsensitive, lowercase.as_str()),
            ];

            for (field, prefix) in lookups {
                let records = self
                    .lookup_prefix(field, prefix, self.settings.prefix_lookup_limit)
                    .await?;
                for record in records {
                    if seen.insert(record.id.clone()) {
                        pool.push(record);
                    }
                }
            }
        }

        Ok(best_match(pool.into_iter().map(|record| {
            let score = record_score(&record, phrase, tokens);
            ScoredMatch { record, score }
        })))
    }

    async fn lookup_equal(
        &self,
        field: CatalogField,
        value: &str,
        limit: usize,
    ) -> Result<Vec<CigarRecord>, ResolveError> {
        let result = self.store.find_equal(field, value, limit).await;
        soften(result, field, value)
    }

    async fn lookup_prefix(
        &self,
        field: CatalogField,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<CigarRecord>, ResolveError> {
        let result = self.store.find_prefix(field, prefix, limit).await;
        soften(result, field, prefix)
    }
}

/// Treat lookup failures as empty results, except authorization failures
fn soften(
    result: Result<Vec<CigarRecord>, CatalogError>,
    field: CatalogField,
    value: &str,
) -> Result<Vec<CigarRecord>, ResolveError> {
    match result {
        Ok(records) => Ok(records),
        Err(CatalogError::PermissionDenied(reason)) => Err(ResolveError::PermissionDenied(reason)),
        Err(e) => {
            warn!("Catalog lookup on {} for {:?} failed: {}", field, value, e);
            Ok(Vec::new())
        }
    }
}
