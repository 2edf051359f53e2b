//! Text normalization and tokenization for OCR output
//!
//! Band text comes back from the vision service with arbitrary line breaks,
//! stray punctuation and inconsistent casing. These helpers turn it into
//! strings that can be compared against catalog fields.

/// Tokens shorter than this are dropped (stray letters, digits, OCR noise)
const MIN_TOKEN_LEN: usize = 2;

/// Characters that survive normalization
fn is_band_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, ' ' | '\'' | '&' | '-')
}

/// Characters that may appear inside a token
fn is_token_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '\'' | '-')
}

/// Clean raw OCR text into a title-cased, brand-like string
///
/// Whitespace runs collapse to a single space, everything except ASCII
/// letters, digits, space, apostrophe, ampersand and hyphen is stripped, and
/// each word is re-cased: words of one or two characters are upper-cased
/// ("NO", "DE"), longer words get a leading capital. Hyphenated parts are
/// cased separately, so "war-hawk" becomes "War-Hawk".
pub fn normalize(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned: String = collapsed.chars().filter(|c| is_band_char(*c)).collect();

    title_case(&cleaned)
}

/// Re-case every whitespace-separated word without stripping anything
///
/// Used to turn upper-cased tokens back into the casing the catalog stores
/// in its `name` and `brand` fields.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    word.split('-').map(case_segment).collect::<Vec<_>>().join("-")
}

fn case_segment(segment: &str) -> String {
    let len = segment.chars().count();
    if len <= 2 {
        return segment.to_uppercase();
    }

    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Split raw OCR text into upper-cased tokens, preserving line order
///
/// Anything other than letters, digits, apostrophes and hyphens separates
/// tokens ("No.4" yields "No" and "4"). Tokens shorter than two characters,
/// or made of punctuation only, are discarded.
pub fn tokenize(raw: &str) -> Vec<String> {
    raw.split(|c: char| !is_token_char(c))
        .filter(|piece| piece.chars().count() >= MIN_TOKEN_LEN)
        .filter(|piece| piece.chars().any(char::is_alphanumeric))
        .map(str::to_uppercase)
        .collect()
}
