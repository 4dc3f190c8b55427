//! Unicode collation and normalization primitives
//!
//! The default collation orders strings case- and accent-insensitively by
//! comparing NFKD casefolded keys, with a bytewise tiebreak so the order is
//! total. The title collation additionally skips leading non-alphanumerics
//! and a configurable list of title articles ("the|a|an" by default) before
//! delegating to the default collation.

use std::cmp::Ordering;

use caseless::default_case_fold_str;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::errors::{Result, StoreError};

/// Name of the default Unicode collation registered with SQLite.
pub const COLLATION_NAME: &str = "ONTODB_COLLATION";

/// Name of the title collation registered with SQLite.
pub const TITLE_COLLATION_NAME: &str = "ONTODB_TITLE_COLLATION";

/// Default '|'-separated list of title articles skipped when sorting.
pub const DEFAULT_TITLE_ARTICLES: &str = "the|a|an";

static PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{P}").expect("punctuation pattern is valid"));

/// Default Unicode case folding.
pub fn case_fold(value: &str) -> String {
    default_case_fold_str(value)
}

/// Collation key: NFKD normalization followed by default case folding.
fn collation_key(value: &str) -> String {
    let decomposed: String = value.nfkd().collect();
    default_case_fold_str(&decomposed)
}

/// Locale-insensitive Unicode-aware comparison used as the default collation.
pub fn unicode_compare(a: &str, b: &str) -> Ordering {
    match collation_key(a).cmp(&collation_key(b)) {
        Ordering::Equal => a.cmp(b),
        other => other,
    }
}

/// Apply a Unicode normalization form by name (nfc, nfd, nfkc, nfkd).
pub fn normalize(value: &str, form: &str) -> Result<String> {
    match form.to_ascii_lowercase().as_str() {
        "nfc" => Ok(value.nfc().collect()),
        "nfd" => Ok(value.nfd().collect()),
        "nfkc" => Ok(value.nfkc().collect()),
        "nfkd" => Ok(value.nfkd().collect()),
        _ => Err(StoreError::Query(format!(
            "Invalid normalization specified, options are 'nfc', 'nfd', 'nfkc' or 'nfkd': {}",
            form
        ))),
    }
}

/// Strip diacritics: NFKD decomposition with combining marks removed.
pub fn unaccent(value: &str) -> String {
    value.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Remove every character in Unicode category P.
pub fn strip_punctuation(value: &str) -> String {
    PUNCTUATION.replace_all(value, "").into_owned()
}

/// Skip leading non-alphanumeric characters, unless that would leave the
/// string empty.
pub fn skip_non_alphanumeric(value: &str) -> &str {
    let trimmed = value.trim_start_matches(|c: char| !c.is_alphanumeric());

    if trimmed.is_empty() {
        value
    } else {
        trimmed
    }
}

/// Strip one leading title article followed by a non-alphanumeric break.
///
/// The match is casefolded; the remainder is returned with its own leading
/// separators skipped. Stripping never leaves an empty string.
fn strip_title_article<'a>(value: &'a str, article: &str) -> Option<&'a str> {
    let folded_article = default_case_fold_str(article);
    let mut article_chars = folded_article.chars();
    let mut byte_index = 0;

    for c in value.chars() {
        let mut folded = c.to_string();
        folded = default_case_fold_str(&folded);

        for fc in folded.chars() {
            match article_chars.next() {
                Some(expected) if expected == fc => {}
                _ => return None,
            }
        }

        byte_index += c.len_utf8();

        if article_chars.as_str().is_empty() {
            break;
        }
    }

    if !article_chars.as_str().is_empty() {
        return None;
    }

    let remaining = &value[byte_index..];

    // The article must be followed by a break character
    let after = remaining.trim_start_matches(|c: char| !c.is_alphanumeric());
    if after.len() == remaining.len() || after.is_empty() {
        return None;
    }

    Some(after)
}

/// Title-aware comparison: leading separators and title articles are ignored.
pub fn title_compare(a: &str, b: &str, articles: &[String]) -> Ordering {
    let mut left = skip_non_alphanumeric(a);
    let mut right = skip_non_alphanumeric(b);

    for article in articles {
        if let Some(stripped) = strip_title_article(left, article) {
            left = stripped;
            break;
        }
    }

    for article in articles {
        if let Some(stripped) = strip_title_article(right, article) {
            right = stripped;
            break;
        }
    }

    unicode_compare(left, right)
}

/// Split a '|'-separated article list into its entries.
pub fn parse_title_articles(value: &str) -> Vec<String> {
    value
        .split('|')
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
