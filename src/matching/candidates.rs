//! Candidate query generation from OCR output

use std::collections::HashSet;

use super::normalize::normalize;

/// Maximum number of leading tokens treated as a brand phrase
const MAX_BRAND_TOKENS: usize = 3;

/// A split of a token sequence into a brand phrase and a variant phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrandVariantSplit {
    /// Leading tokens joined by a single space
    pub brand: String,
    /// Remaining tokens, never empty
    pub variant: Vec<String>,
}

impl BrandVariantSplit {
    /// Variant tokens joined by a single space
    pub fn variant_phrase(&self) -> String {
        self.variant.join(" ")
    }
}

/// Build ordered, deduplicated catalog queries from a raw OCR text block
///
/// Preference order: the whole block, the first two lines, the longest line,
/// then every line on its own. Each candidate is normalized; empty results
/// and repeats are dropped.
pub fn build_text_candidates(raw_ocr_text: &str) -> Vec<String> {
    let lines: Vec<&str> = raw_ocr_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.is_empty() {
        return Vec::new();
    }

    let mut ordered = Vec::with_capacity(lines.len() + 3);
    ordered.push(normalize(&lines.join(" ")));
    ordered.push(normalize(&lines[..lines.len().min(2)].join(" ")));
    if let Some(longest) = longest_line(&lines) {
        ordered.push(normalize(longest));
    }
    ordered.extend(lines.iter().map(|line| normalize(line)));

    let mut seen = HashSet::new();
    ordered
        .into_iter()
        .filter(|candidate| !candidate.is_empty())
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect()
}

/// Longest line by character count; the earliest one wins a tie
fn longest_line<'a>(lines: &[&'a str]) -> Option<&'a str> {
    let mut best: Option<(&str, usize)> = None;
    for line in lines {
        let len = line.chars().count();
        match best {
            Some((_, best_len)) if best_len >= len => {}
            _ => best = Some((line, len)),
        }
    }
    best.map(|(line, _)| line)
}

/// Partition tokens into up to three brand/variant splits
///
/// The brand takes the first 1, 2 or 3 tokens and the variant keeps the
/// rest; at least one token is always left for the variant.
pub fn brand_variant_splits(tokens: &[String]) -> Vec<BrandVariantSplit> {
    let max_brand = tokens.len().saturating_sub(1).min(MAX_BRAND_TOKENS);

    (1..=max_brand)
        .map(|n| BrandVariantSplit {
            brand: tokens[..n].join(" "),
            variant: tokens[n..].to_vec(),
        })
        .collect()
}
