/**
 * class.rs
 * Ontology class entity with registry-resolved cross references
 */

use std::sync::{Arc, RwLock};

use crate::ontology::property::Property;
use crate::ontology::registry::Ontologies;

/// Where an entity was defined in its ontology source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Default)]
struct ClassData {
    uri: String,
    name: String,
    id: i64,
    super_classes: Vec<String>,
    domain_indexes: Vec<String>,
    notify: bool,
    use_snapshot: bool,
    source: Option<SourceLocation>,
}

/// An ontology class. Cross references (super classes, domain indexes) are
/// stored as URIs and resolved against the registry on access, so reference
/// cycles between classes and properties stay representable.
#[derive(Debug, Default)]
pub struct Class {
    data: RwLock<ClassData>,
}

impl Class {
    pub fn new() -> Self {
        Class::default()
    }

    /// Create a stub whose fields are filled from the registry snapshot on
    /// first access.
    pub fn new_from_snapshot() -> Self {
        let class = Class::default();
        class.data.write().unwrap().use_snapshot = true;
        class
    }

    fn maybe_sync_from_snapshot(&self, ontologies: &Ontologies) {
        let uri = {
            let data = self.data.read().unwrap();
            if !data.use_snapshot {
                return;
            }
            data.uri.clone()
        };

        let entry = match ontologies.snapshot_class(&uri) {
            Some(entry) => entry,
            None => return,
        };

        let mut data = self.data.write().unwrap();
        // Lost the race against another reader
        if !data.use_snapshot {
            return;
        }

        data.super_classes = entry.super_classes.clone();
        data.use_snapshot = false;
    }

    pub fn uri(&self) -> String {
        self.data.read().unwrap().uri.clone()
    }

    /// Set the URI and derive the prefixed local name from it.
    ///
    /// The name is `{namespace.prefix}:{tail}` where the tail follows the
    /// last `#` (or `/` for ontologies whose namespace URI does not end in a
    /// hash). An underivable name is left empty and logged.
    pub fn set_uri(&self, ontologies: &Ontologies, uri: &str) {
        let name = derive_local_name(ontologies, uri, "class");

        let mut data = self.data.write().unwrap();
        data.uri = uri.to_string();
        data.name = name.unwrap_or_default();
    }

    /// The prefixed local name, e.g. `nfo:Document`.
    pub fn name(&self) -> String {
        self.data.read().unwrap().name.clone()
    }

    pub fn id(&self) -> i64 {
        self.data.read().unwrap().id
    }

    pub fn set_id(&self, id: i64) {
        self.data.write().unwrap().id = id;
    }

    pub fn notify(&self) -> bool {
        self.data.read().unwrap().notify
    }

    pub fn set_notify(&self, notify: bool) {
        self.data.write().unwrap().notify = notify;
    }

    pub fn source_location(&self) -> Option<SourceLocation> {
        self.data.read().unwrap().source.clone()
    }

    pub fn set_source_location(&self, location: SourceLocation) {
        self.data.write().unwrap().source = Some(location);
    }

    pub fn add_super_class(&self, super_class: &Class) {
        self.data.write().unwrap().super_classes.push(super_class.uri());
    }

    /// Resolve the super classes against the registry, in insertion order.
    pub fn super_classes(&self, ontologies: &Ontologies) -> Vec<Arc<Class>> {
        self.maybe_sync_from_snapshot(ontologies);

        let uris = self.data.read().unwrap().super_classes.clone();
        uris.iter()
            .filter_map(|uri| ontologies.get_class_by_uri(uri))
            .collect()
    }

    pub fn add_domain_index(&self, property: &Property) {
        self.data.write().unwrap().domain_indexes.push(property.uri());
    }

    /// Resolve the domain-index properties against the registry.
    pub fn domain_indexes(&self, ontologies: &Ontologies) -> Vec<Arc<Property>> {
        let uris = self.data.read().unwrap().domain_indexes.clone();
        uris.iter()
            .filter_map(|uri| ontologies.get_property_by_uri(uri))
            .collect()
    }
}

/// Shared URI → "prefix:tail" derivation for classes and properties.
pub(crate) fn derive_local_name(
    ontologies: &Ontologies,
    uri: &str,
    kind: &str,
) -> Option<String> {
    let sep = uri.rfind('#').or_else(|| uri.rfind('/'));

    let sep = match sep {
        Some(sep) => sep,
        None => {
            tracing::warn!("Unknown namespace of {} {}", kind, uri);
            return None;
        }
    };

    let namespace_uri = &uri[..=sep];
    let tail = &uri[sep + 1..];

    match ontologies.get_namespace_by_uri(namespace_uri) {
        Some(namespace) => Some(format!("{}:{}", namespace.prefix(), tail)),
        None => {
            tracing::warn!("Unknown namespace {} of {} {}", namespace_uri, kind, uri);
            None
        }
    }
}
