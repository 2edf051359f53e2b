//! Relevance scoring shared by every resolver tier
//!
//! Two signals are combined: a flat +1 for every query token found in a
//! field, and a quadratic boost when the whole phrase appears contiguously.
//! Past a few characters the boost dominates, so a long exact phrase beats
//! any number of scattered token hits. These constants are pinned; ranking
//! expectations elsewhere depend on the exact arithmetic.

use crate::catalog::{CatalogField, CigarRecord};

/// A catalog record paired with its relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub record: CigarRecord,
    pub score: u64,
}

/// Number of tokens that occur (case-insensitively) somewhere in `text`
///
/// Every matching token contributes exactly 1, regardless of its length or
/// how often it occurs.
pub fn token_overlap_score(text: &str, tokens: &[String]) -> u64 {
    let text = text.to_lowercase();
    tokens
        .iter()
        .filter(|token| text.contains(&token.to_lowercase()))
        .count() as u64
}

/// Squared character length of `needle` when it occurs contiguously in
/// `haystack` (case-insensitive), otherwise 0
pub fn contiguous_boost(haystack: &str, needle: &str) -> u64 {
    let needle = needle.to_lowercase();
    if !haystack.to_lowercase().contains(&needle) {
        return 0;
    }
    let len = needle.chars().count() as u64;
    len * len
}

/// Boost plus overlap for a single field
pub fn field_score(field: &str, phrase: &str, tokens: &[String]) -> u64 {
    contiguous_boost(field, phrase) + token_overlap_score(field, tokens)
}

/// Best field score of a record across `name`, `brand` and `name_insensitive`
pub fn record_score(record: &CigarRecord, phrase: &str, tokens: &[String]) -> u64 {
    [
        CatalogField::Name,
        CatalogField::Brand,
        CatalogField::NameInsensitive,
    ]
    .into_iter()
    .map(|field| field_score(record.field(field), phrase, tokens))
    .max()
    .unwrap_or(0)
}

/// Score of a record's name against the variant part of a brand/variant split
///
/// The boost and the overlap each take their best value over `name` and
/// `name_insensitive` independently.
pub fn variant_score(record: &CigarRecord, variant_phrase: &str, variant_tokens: &[String]) -> u64 {
    let boost = contiguous_boost(&record.name, variant_phrase)
        .max(contiguous_boost(&record.name_insensitive, variant_phrase));
    let overlap = token_overlap_score(&record.name, variant_tokens)
        .max(token_overlap_score(&record.name_insensitive, variant_tokens));
    boost + overlap
}

/// Highest-scoring match with a positive score; the first one found wins ties
pub fn best_match<I>(matches: I) -> Option<ScoredMatch>
where
    I: IntoIterator<Item = ScoredMatch>,
{
    let mut best: Option<ScoredMatch> = None;
    for candidate in matches {
        if candidate.score == 0 {
            continue;
        }
        match &best {
            Some(current) if current.score >= candidate.score => {}
            _ => best = Some(candidate),
        }
    }
    best
}
