/**
 * property.rs
 * Ontology property entity: value typing, cardinality, index flags and the
 * derived SQL table name
 */

use std::sync::{Arc, RwLock};

use crate::ontology::class::{derive_local_name, Class, SourceLocation};
use crate::ontology::registry::Ontologies;

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
pub const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const RDF_LANGSTRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
pub const RDFS_RESOURCE: &str = "http://www.w3.org/2000/01/rdf-schema#Resource";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Value type of a property, fixed by its range URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum PropertyType {
    Unknown = 0,
    String = 1,
    Boolean = 2,
    Integer = 3,
    Double = 4,
    Date = 5,
    DateTime = 6,
    Resource = 7,
    LangString = 8,
}

impl PropertyType {
    /// Map a range URI to the property type. Any URI outside the fixed XSD
    /// table is a resource reference.
    pub fn from_range_uri(uri: &str) -> PropertyType {
        match uri {
            XSD_STRING => PropertyType::String,
            XSD_BOOLEAN => PropertyType::Boolean,
            XSD_INTEGER => PropertyType::Integer,
            XSD_DOUBLE => PropertyType::Double,
            XSD_DATE => PropertyType::Date,
            XSD_DATETIME => PropertyType::DateTime,
            RDF_LANGSTRING => PropertyType::LangString,
            _ => PropertyType::Resource,
        }
    }

    pub fn from_code(code: i64) -> Option<PropertyType> {
        match code {
            0 => Some(PropertyType::Unknown),
            1 => Some(PropertyType::String),
            2 => Some(PropertyType::Boolean),
            3 => Some(PropertyType::Integer),
            4 => Some(PropertyType::Double),
            5 => Some(PropertyType::Date),
            6 => Some(PropertyType::DateTime),
            7 => Some(PropertyType::Resource),
            8 => Some(PropertyType::LangString),
            _ => None,
        }
    }

    /// The XSD/RDF URI rendered by the `SparqlDataType` helper. Unknown has
    /// no URI representation.
    pub fn uri(&self) -> Option<&'static str> {
        match self {
            PropertyType::Unknown => None,
            PropertyType::String => Some(XSD_STRING),
            PropertyType::Boolean => Some(XSD_BOOLEAN),
            PropertyType::Integer => Some(XSD_INTEGER),
            PropertyType::Double => Some(XSD_DOUBLE),
            PropertyType::Date => Some(XSD_DATE),
            PropertyType::DateTime => Some(XSD_DATETIME),
            PropertyType::Resource => Some(RDFS_RESOURCE),
            PropertyType::LangString => Some(RDF_LANGSTRING),
        }
    }
}

#[derive(Debug)]
struct PropertyData {
    uri: String,
    name: String,
    table_name: Option<String>,
    data_type: PropertyType,
    domain: Option<String>,
    range: Option<String>,
    weight: u32,
    id: i64,
    indexed: bool,
    fulltext_indexed: bool,
    multiple_values: bool,
    inverse_functional: bool,
    secondary_index: Option<String>,
    domain_indexes: Vec<String>,
    super_properties: Vec<String>,
    use_snapshot: bool,
    source: Option<SourceLocation>,
}

impl Default for PropertyData {
    fn default() -> Self {
        PropertyData {
            uri: String::new(),
            name: String::new(),
            table_name: None,
            data_type: PropertyType::Unknown,
            domain: None,
            range: None,
            weight: 1,
            id: 0,
            indexed: false,
            fulltext_indexed: false,
            multiple_values: true,
            inverse_functional: false,
            secondary_index: None,
            domain_indexes: Vec::new(),
            super_properties: Vec::new(),
            use_snapshot: false,
            source: None,
        }
    }
}

/// An ontology property. Domain, range, secondary index and super properties
/// are stored as URIs and resolved against the registry.
#[derive(Debug, Default)]
pub struct Property {
    data: RwLock<PropertyData>,
}

impl Property {
    pub fn new() -> Self {
        Property::default()
    }

    /// Create a stub whose fields are filled from the registry snapshot on
    /// first access.
    pub fn new_from_snapshot() -> Self {
        let property = Property::default();
        property.data.write().unwrap().use_snapshot = true;
        property
    }

    fn maybe_sync_from_snapshot(&self, ontologies: &Ontologies) {
        let uri = {
            let data = self.data.read().unwrap();
            if !data.use_snapshot {
                return;
            }
            data.uri.clone()
        };

        let entry = match ontologies.snapshot_property(&uri) {
            Some(entry) => entry,
            None => return,
        };

        let mut data = self.data.write().unwrap();
        if !data.use_snapshot {
            return;
        }

        data.data_type = PropertyType::from_range_uri(&entry.range);
        data.range = Some(entry.range.clone());
        data.domain = Some(entry.domain.clone());
        data.domain_indexes = entry.domain_indexes.clone();
        data.fulltext_indexed = entry.fulltext_indexed;
        data.multiple_values = entry.max_cardinality.is_none();
        data.inverse_functional = entry.inverse_functional;
        data.use_snapshot = false;
    }

    pub fn uri(&self) -> String {
        self.data.read().unwrap().uri.clone()
    }

    /// Set the URI and derive the prefixed local name, exactly as for
    /// classes.
    pub fn set_uri(&self, ontologies: &Ontologies, uri: &str) {
        let name = derive_local_name(ontologies, uri, "property");

        let mut data = self.data.write().unwrap();
        data.uri = uri.to_string();
        data.name = name.unwrap_or_default();
    }

    pub fn name(&self) -> String {
        self.data.read().unwrap().name.clone()
    }

    pub fn id(&self) -> i64 {
        self.data.read().unwrap().id
    }

    pub fn set_id(&self, id: i64) {
        self.data.write().unwrap().id = id;
    }

    pub fn data_type(&self, ontologies: &Ontologies) -> PropertyType {
        self.maybe_sync_from_snapshot(ontologies);
        self.data.read().unwrap().data_type
    }

    pub fn set_domain(&self, class: &Class) {
        self.data.write().unwrap().domain = Some(class.uri());
    }

    pub fn domain(&self, ontologies: &Ontologies) -> Option<Arc<Class>> {
        self.maybe_sync_from_snapshot(ontologies);

        let uri = self.data.read().unwrap().domain.clone()?;
        ontologies.get_class_by_uri(&uri)
    }

    /// Setting the range fixes the data type through the XSD mapping table.
    pub fn set_range(&self, class: &Class) {
        let uri = class.uri();
        let mut data = self.data.write().unwrap();
        data.data_type = PropertyType::from_range_uri(&uri);
        data.range = Some(uri);
    }

    pub fn range(&self, ontologies: &Ontologies) -> Option<Arc<Class>> {
        self.maybe_sync_from_snapshot(ontologies);

        let uri = self.data.read().unwrap().range.clone()?;
        ontologies.get_class_by_uri(&uri)
    }

    pub fn weight(&self) -> u32 {
        self.data.read().unwrap().weight
    }

    pub fn set_weight(&self, weight: u32) {
        self.data.write().unwrap().weight = weight.max(1);
    }

    pub fn indexed(&self) -> bool {
        self.data.read().unwrap().indexed
    }

    pub fn set_indexed(&self, indexed: bool) {
        self.data.write().unwrap().indexed = indexed;
    }

    pub fn fulltext_indexed(&self, ontologies: &Ontologies) -> bool {
        self.maybe_sync_from_snapshot(ontologies);
        self.data.read().unwrap().fulltext_indexed
    }

    pub fn set_fulltext_indexed(&self, fulltext_indexed: bool) {
        self.data.write().unwrap().fulltext_indexed = fulltext_indexed;
    }

    pub fn multiple_values(&self, ontologies: &Ontologies) -> bool {
        self.maybe_sync_from_snapshot(ontologies);
        self.data.read().unwrap().multiple_values
    }

    /// Changing the cardinality invalidates the cached table name.
    pub fn set_multiple_values(&self, multiple_values: bool) {
        let mut data = self.data.write().unwrap();
        data.multiple_values = multiple_values;
        data.table_name = None;
    }

    pub fn is_inverse_functional(&self, ontologies: &Ontologies) -> bool {
        self.maybe_sync_from_snapshot(ontologies);
        self.data.read().unwrap().inverse_functional
    }

    pub fn set_inverse_functional(&self, inverse_functional: bool) {
        self.data.write().unwrap().inverse_functional = inverse_functional;
    }

    pub fn set_secondary_index(&self, property: &Property) {
        self.data.write().unwrap().secondary_index = Some(property.uri());
    }

    pub fn secondary_index(&self, ontologies: &Ontologies) -> Option<Arc<Property>> {
        let uri = self.data.read().unwrap().secondary_index.clone()?;
        ontologies.get_property_by_uri(&uri)
    }

    pub fn add_super_property(&self, property: &Property) {
        self.data.write().unwrap().super_properties.push(property.uri());
    }

    pub fn super_properties(&self, ontologies: &Ontologies) -> Vec<Arc<Property>> {
        let uris = self.data.read().unwrap().super_properties.clone();
        uris.iter()
            .filter_map(|uri| ontologies.get_property_by_uri(uri))
            .collect()
    }

    pub fn add_domain_index(&self, class: &Class) {
        self.data.write().unwrap().domain_indexes.push(class.uri());
    }

    pub fn domain_indexes(&self, ontologies: &Ontologies) -> Vec<Arc<Class>> {
        self.maybe_sync_from_snapshot(ontologies);

        let uris = self.data.read().unwrap().domain_indexes.clone();
        uris.iter()
            .filter_map(|uri| ontologies.get_class_by_uri(uri))
            .collect()
    }

    pub fn source_location(&self) -> Option<SourceLocation> {
        self.data.read().unwrap().source.clone()
    }

    pub fn set_source_location(&self, location: SourceLocation) {
        self.data.write().unwrap().source = Some(location);
    }

    /// The SQL table this property is stored in: the per-property edge table
    /// `{domain}_{name}` for multi-valued properties, the domain's row table
    /// otherwise. Computed lazily, invalidated by `set_multiple_values`.
    pub fn table_name(&self, ontologies: &Ontologies) -> String {
        self.maybe_sync_from_snapshot(ontologies);

        if let Some(cached) = self.data.read().unwrap().table_name.clone() {
            return cached;
        }

        let domain_name = self
            .domain(ontologies)
            .map(|class| class.name())
            .unwrap_or_else(|| {
                tracing::warn!("Property {} has no resolvable domain", self.uri());
                String::new()
            });

        let mut data = self.data.write().unwrap();
        let table_name = if data.multiple_values {
            format!("{}_{}", domain_name, data.name)
        } else {
            domain_name
        };

        data.table_name = Some(table_name.clone());
        table_name
    }
}
