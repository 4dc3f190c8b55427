/**
 * namespace.rs
 * Ontology namespace entity: a unique URI paired with a short prefix
 */

/// A namespace registered by an ontology, e.g. prefix "rdf" for
/// `http://www.w3.org/1999/02/22-rdf-syntax-ns#`.
///
/// Namespaces are immutable once created; the registry owns them for the
/// lifetime of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    uri: String,
    prefix: String,
}

impl Namespace {
    pub fn new(uri: impl Into<String>, prefix: impl Into<String>) -> Self {
        Namespace {
            uri: uri.into(),
            prefix: prefix.into(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// An ontology file known to the registry, tracked by URI together with its
/// last-modified stamp so reloads can detect changed definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ontology {
    uri: String,
    last_modified: i64,
}

impl Ontology {
    pub fn new(uri: impl Into<String>, last_modified: i64) -> Self {
        Ontology {
            uri: uri.into(),
            last_modified,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }
}
