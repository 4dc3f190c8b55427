/**
 * registry.rs
 * Process-wide ontology registry
 *
 * Owns every Namespace, Ontology, Class and Property; everything else holds
 * URIs and resolves them here. Constructed explicitly and passed by handle;
 * shutdown() empties the registry so a fresh ontology load starts clean.
 */

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::errors::Result;
use crate::ontology::class::Class;
use crate::ontology::namespace::{Namespace, Ontology};
use crate::ontology::property::{Property, RDF_TYPE};
use crate::ontology::snapshot::{
    OntologySnapshot, SnapshotClass, SnapshotNamespace, SnapshotProperty,
};

#[derive(Default)]
struct RegistryInner {
    namespaces: Vec<Arc<Namespace>>,
    namespace_uris: HashMap<String, Arc<Namespace>>,
    ontologies: Vec<Arc<Ontology>>,
    ontology_uris: HashMap<String, Arc<Ontology>>,
    classes: Vec<Arc<Class>>,
    class_uris: HashMap<String, Arc<Class>>,
    properties: Vec<Arc<Property>>,
    property_uris: HashMap<String, Arc<Property>>,
    id_uri_pairs: HashMap<i64, String>,
    rdf_type: Option<Arc<Property>>,
    snapshot: Option<OntologySnapshot>,
}

/// The ontology registry. Lookups by URI are O(1) and return `None` on a
/// miss; they never fail. Adding an entity under an already-mapped URI
/// replaces the previous entry.
#[derive(Default)]
pub struct Ontologies {
    inner: RwLock<RegistryInner>,
}

impl Ontologies {
    pub fn new() -> Ontologies {
        Ontologies::default()
    }

    /// Drop every owned entity and the snapshot. A subsequent load starts
    /// from an empty registry.
    pub fn shutdown(&self) {
        let mut inner = self.inner.write().unwrap();
        *inner = RegistryInner::default();
    }

    pub fn add_namespace(&self, namespace: Namespace) {
        let namespace = Arc::new(namespace);
        let mut inner = self.inner.write().unwrap();

        let uri = namespace.uri().to_string();
        if inner.namespace_uris.contains_key(&uri) {
            inner.namespaces.retain(|n| n.uri() != uri);
        }
        inner.namespaces.push(Arc::clone(&namespace));
        inner.namespace_uris.insert(uri, namespace);
    }

    pub fn get_namespace_by_uri(&self, uri: &str) -> Option<Arc<Namespace>> {
        if let Some(namespace) = self.inner.read().unwrap().namespace_uris.get(uri) {
            return Some(Arc::clone(namespace));
        }

        // Materialize from the snapshot
        let prefix = {
            let inner = self.inner.read().unwrap();
            let snapshot = inner.snapshot.as_ref()?;
            snapshot.namespaces.get(uri)?.prefix.clone()
        };

        let namespace = Arc::new(Namespace::new(uri, prefix));
        let mut inner = self.inner.write().unwrap();
        inner
            .namespace_uris
            .entry(uri.to_string())
            .or_insert_with(|| Arc::clone(&namespace));
        Some(namespace)
    }

    pub fn get_namespaces(&self) -> Vec<Arc<Namespace>> {
        self.inner.read().unwrap().namespaces.clone()
    }

    pub fn add_ontology(&self, ontology: Ontology) {
        let ontology = Arc::new(ontology);
        let mut inner = self.inner.write().unwrap();

        let uri = ontology.uri().to_string();
        if inner.ontology_uris.contains_key(&uri) {
            inner.ontologies.retain(|o| o.uri() != uri);
        }
        inner.ontologies.push(Arc::clone(&ontology));
        inner.ontology_uris.insert(uri, ontology);
    }

    pub fn get_ontology_by_uri(&self, uri: &str) -> Option<Arc<Ontology>> {
        self.inner.read().unwrap().ontology_uris.get(uri).cloned()
    }

    pub fn get_ontologies(&self) -> Vec<Arc<Ontology>> {
        self.inner.read().unwrap().ontologies.clone()
    }

    pub fn add_class(&self, class: Class) {
        self.add_class_arc(Arc::new(class));
    }

    fn add_class_arc(&self, class: Arc<Class>) {
        let uri = class.uri();
        let mut inner = self.inner.write().unwrap();

        if !uri.is_empty() {
            if inner.class_uris.contains_key(&uri) {
                inner.classes.retain(|c| c.uri() != uri);
            }
            inner.class_uris.insert(uri, Arc::clone(&class));
        }
        inner.classes.push(class);
    }

    pub fn get_class_by_uri(&self, uri: &str) -> Option<Arc<Class>> {
        if let Some(class) = self.inner.read().unwrap().class_uris.get(uri) {
            return Some(Arc::clone(class));
        }

        // A persisted class not yet loaded: materialize a stub and fill it
        // on demand.
        let known = {
            let inner = self.inner.read().unwrap();
            inner
                .snapshot
                .as_ref()
                .map(|s| s.classes.contains_key(uri))
                .unwrap_or(false)
        };
        if !known {
            return None;
        }

        let stub = Class::new_from_snapshot();
        stub.set_uri(self, uri);

        let stub = Arc::new(stub);
        let mut inner = self.inner.write().unwrap();
        let entry = inner
            .class_uris
            .entry(uri.to_string())
            .or_insert_with(|| Arc::clone(&stub));
        Some(Arc::clone(entry))
    }

    pub fn get_classes(&self) -> Vec<Arc<Class>> {
        self.inner.read().unwrap().classes.clone()
    }

    pub fn add_property(&self, property: Property) {
        self.add_property_arc(Arc::new(property));
    }

    fn add_property_arc(&self, property: Arc<Property>) {
        let uri = property.uri();
        let mut inner = self.inner.write().unwrap();

        if uri == RDF_TYPE {
            inner.rdf_type = Some(Arc::clone(&property));
        }

        if !uri.is_empty() {
            if inner.property_uris.contains_key(&uri) {
                inner.properties.retain(|p| p.uri() != uri);
            }
            inner.property_uris.insert(uri, Arc::clone(&property));
        }
        inner.properties.push(property);
    }

    pub fn get_property_by_uri(&self, uri: &str) -> Option<Arc<Property>> {
        if let Some(property) = self.inner.read().unwrap().property_uris.get(uri) {
            return Some(Arc::clone(property));
        }

        let known = {
            let inner = self.inner.read().unwrap();
            inner
                .snapshot
                .as_ref()
                .map(|s| s.properties.contains_key(uri))
                .unwrap_or(false)
        };
        if !known {
            return None;
        }

        let stub = Property::new_from_snapshot();
        stub.set_uri(self, uri);

        let stub = Arc::new(stub);
        let mut inner = self.inner.write().unwrap();
        let entry = inner
            .property_uris
            .entry(uri.to_string())
            .or_insert_with(|| Arc::clone(&stub));
        Some(Arc::clone(entry))
    }

    pub fn get_properties(&self) -> Vec<Arc<Property>> {
        self.inner.read().unwrap().properties.clone()
    }

    /// The distinguished rdf:type property, cached when added.
    pub fn get_rdf_type(&self) -> Option<Arc<Property>> {
        self.inner.read().unwrap().rdf_type.clone()
    }

    pub fn add_id_uri_pair(&self, id: i64, uri: &str) {
        self.inner
            .write()
            .unwrap()
            .id_uri_pairs
            .insert(id, uri.to_string());
    }

    pub fn get_uri_by_id(&self, id: i64) -> Option<String> {
        self.inner.read().unwrap().id_uri_pairs.get(&id).cloned()
    }

    /// Stable alphabetical sort of the class list by local name. Callers may
    /// rely on the ordering afterwards.
    pub fn sort(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.classes.sort_by(|a, b| a.name().cmp(&b.name()));
    }

    pub(crate) fn snapshot_class(&self, uri: &str) -> Option<SnapshotClass> {
        let inner = self.inner.read().unwrap();
        inner.snapshot.as_ref()?.classes.get(uri).cloned()
    }

    pub(crate) fn snapshot_property(&self, uri: &str) -> Option<SnapshotProperty> {
        let inner = self.inner.read().unwrap();
        inner.snapshot.as_ref()?.properties.get(uri).cloned()
    }

    /// Persist the registry as a snapshot document.
    pub fn write_snapshot(&self, path: &Path) -> Result<()> {
        let mut snapshot = OntologySnapshot::default();

        for namespace in self.get_namespaces() {
            snapshot.namespaces.insert(
                namespace.uri().to_string(),
                SnapshotNamespace {
                    prefix: namespace.prefix().to_string(),
                },
            );
        }

        for class in self.get_classes() {
            snapshot.classes.insert(
                class.uri(),
                SnapshotClass {
                    name: class.name(),
                    super_classes: class
                        .super_classes(self)
                        .iter()
                        .map(|c| c.uri())
                        .collect(),
                },
            );
        }

        for property in self.get_properties() {
            let domain = property.domain(self).map(|c| c.uri()).unwrap_or_default();
            let range = property.range(self).map(|c| c.uri()).unwrap_or_default();

            snapshot.properties.insert(
                property.uri(),
                SnapshotProperty {
                    name: property.name(),
                    domain,
                    range,
                    max_cardinality: if property.multiple_values(self) {
                        None
                    } else {
                        Some(1)
                    },
                    inverse_functional: property.is_inverse_functional(self),
                    fulltext_indexed: property.fulltext_indexed(self),
                    domain_indexes: property
                        .domain_indexes(self)
                        .iter()
                        .map(|c| c.uri())
                        .collect(),
                },
            );
        }

        snapshot.write(path)
    }

    /// Reset the registry and install a snapshot for lazy materialization.
    pub fn load_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = OntologySnapshot::load(path)?;

        self.shutdown();
        self.inner.write().unwrap().snapshot = Some(snapshot);
        Ok(())
    }
}
