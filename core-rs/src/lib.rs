//! # ontodb core - ontology-driven SQLite triple store
//!
//! The storage engine of a local RDF triple store: an in-memory ontology
//! model (namespaces, classes, properties), an SQLite-backed interface layer
//! evaluating prepared statements into typed tabular and cursor results, an
//! MRU cache of compiled statements, the SPARQL-semantic SQL helper
//! functions (regex, date/time, collation, URI handling, normalization,
//! hashing, UUID, language-tagged strings, geospatial) and the full-text
//! search integration used for text predicates.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │           Ontologies (registry)               │
//! │   Namespace · Class · Property · snapshot     │
//! └───────────────────────────────────────────────┘
//!                       │ table names, value types
//!                       ▼
//! ┌───────────────────────────────────────────────┐
//! │   DbInterface (SQLite, UDFs, collations)      │
//! │   DbStatement ── MRU ── DbCursor ── FTS       │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Miners, IPC surfaces and command-line tools are external collaborators:
//! they supply URIs and property values, issue queries and consume cursors.

pub mod collation;
pub mod config;
pub mod datetime;
pub mod db;
pub mod errors;
pub mod notifier;
pub mod ontology;

pub use config::DbConfig;
pub use db::{
    BindValue, CacheKind, Cancellable, DbCursor, DbInterface, DbInterfaceFlags, DbStatement,
    FtsColumn, LangString, SparqlValueType, TypedValue, BNODE_PREFIX,
};
pub use errors::{Result, StoreError};
pub use notifier::{GraphUpdate, GraphUpdateNotifier, Quad};
pub use ontology::{Class, Namespace, Ontologies, Ontology, Property, PropertyType, SourceLocation};

/// Version of the storage format understood by this build.
pub const VERSION: &str = "0.4.1";

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: core modules are exported and accessible
    ///
    /// Verifies that the main types are re-exported from the library root
    /// for external crate usage.
    #[test]
    fn test_core_types_exported() {
        let _ = std::any::type_name::<DbInterface>();
        let _ = std::any::type_name::<Ontologies>();
        let _ = std::any::type_name::<StoreError>();
        let _ = std::any::type_name::<GraphUpdateNotifier>();

        fn accepts_flags(_: DbInterfaceFlags) {}
        fn accepts_cache_kind(_: CacheKind) {}
        fn accepts_value_type(_: SparqlValueType) {}

        accepts_flags(DbInterfaceFlags::default());
        accepts_cache_kind(CacheKind::Select);
        accepts_value_type(SparqlValueType::Unbound);

        // If this compiles, exports are correct
    }

    #[test]
    fn test_version_constant() {
        assert_eq!(VERSION, "0.4.1");
    }
}
