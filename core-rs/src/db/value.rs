/**
 * value.rs
 * Value kinds crossing the SQL boundary: SPARQL cursor value types, typed
 * bind values, typed extraction results and the langString blob codec
 */

use chrono::{DateTime, FixedOffset};

/// Printable prefix of blank node IRIs; a Resource row with an empty URI is
/// a blank node rendered as `urn:bnode:{ID}`.
pub const BNODE_PREFIX: &str = "urn:bnode:";

/// Value type reported per cursor column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparqlValueType {
    Unbound,
    Uri,
    String,
    Integer,
    Double,
    DateTime,
    BlankNode,
    Boolean,
}

/// A tagged value accepted by the generic bind entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Null,
    Integer(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<FixedOffset>),
}

/// A typed value extracted by `get_values`.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    LangString(Vec<u8>),
    Integer(i64),
    Double(f64),
    DateTime(DateTime<FixedOffset>),
}

/// A string paired with an IETF language tag, persisted as a blob laid out
/// `text\0langTag` (the blob length covers both halves).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangString {
    pub text: String,
    pub tag: String,
}

impl LangString {
    pub fn new(text: impl Into<String>, tag: impl Into<String>) -> Self {
        LangString {
            text: text.into(),
            tag: tag.into(),
        }
    }

    /// Encode as the persisted blob layout.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = Vec::with_capacity(self.text.len() + 1 + self.tag.len());
        blob.extend_from_slice(self.text.as_bytes());
        blob.push(0);
        blob.extend_from_slice(self.tag.as_bytes());
        blob
    }

    /// Decode the persisted blob layout; `None` when no NUL separator is
    /// present or either half is not UTF-8.
    pub fn from_blob(blob: &[u8]) -> Option<LangString> {
        let nul = blob.iter().position(|b| *b == 0)?;
        let text = std::str::from_utf8(&blob[..nul]).ok()?;
        let tag = std::str::from_utf8(&blob[nul + 1..]).ok()?;

        Some(LangString::new(text, tag))
    }

    /// Exact tag comparison against the encoded blob, without allocating.
    ///
    /// The length check mirrors the persisted layout: text length plus
    /// separator plus tag length must cover the whole blob.
    pub fn blob_matches_tag(blob: &[u8], tag: &str) -> bool {
        let nul = match blob.iter().position(|b| *b == 0) {
            Some(nul) => nul,
            None => return false,
        };

        let text_len = nul + 1;
        text_len + tag.len() == blob.len() && &blob[text_len..] == tag.as_bytes()
    }
}
