//! Band Matching Engine
//!
//! Turns logo labels and OCR text into catalog records:
//! - normalization and tokenization of raw OCR strings
//! - candidate query generation and brand/variant splitting
//! - shared relevance scoring
//! - tiered catalog resolution

pub mod candidates;
pub mod normalize;
pub mod resolver;
pub mod scoring;

pub use candidates::{brand_variant_splits, build_text_candidates, BrandVariantSplit};
pub use normalize::{normalize, title_case, tokenize};
pub use resolver::{CatalogResolver, MatchTier, ResolveError, ResolvedMatch, ResolverSettings};
pub use scoring::{contiguous_boost, token_overlap_score, ScoredMatch};
