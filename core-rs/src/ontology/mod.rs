/**
 * ontology module
 *
 * - namespace: Namespace and Ontology entities
 * - class: Class entity and local-name derivation
 * - property: Property entity, value typing and table-name derivation
 * - registry: the owning Ontologies registry with by-URI lookup
 * - snapshot: persisted snapshot backing lazy materialization
 */

pub mod class;
pub mod namespace;
pub mod property;
pub mod registry;
pub mod snapshot;

pub use class::{Class, SourceLocation};
pub use namespace::{Namespace, Ontology};
pub use property::{Property, PropertyType};
pub use registry::Ontologies;
pub use snapshot::OntologySnapshot;

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: ontology entity types are exported at the module root
    ///
    /// Verifies that the ontology model types are re-exported for external
    /// crate usage without deep module paths.
    #[test]
    fn test_ontology_exports() {
        fn accepts_class(_: Class) {}
        fn accepts_property(_: Property) {}
        fn accepts_registry(_: Ontologies) {}

        accepts_class(Class::new());
        accepts_property(Property::new());
        accepts_registry(Ontologies::new());

        let _ = PropertyType::from_code(1);
        let _ = Namespace::new("http://ex/", "ex");

        // If this compiles, exports are correct
    }
}
