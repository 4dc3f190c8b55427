//! Store Integration Tests
//!
//! Exercises the ontology registry and the SQLite interface together:
//! class registration with name derivation, property typing through ranges,
//! statement caching, typed value extraction and the SPARQL cursor surface.
//!
//! Uses tempfile for on-disk databases and unique shared-cache keys for
//! in-memory ones, so tests stay isolated.

use ontodb_core::{
    CacheKind, Class, DbInterface, DbInterfaceFlags, LangString, Namespace, Ontologies, Property,
    PropertyType, SparqlValueType, TypedValue,
};
use uuid::Uuid;

/// Helper: capture library logs in test output
fn init_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Helper: in-memory interface on a unique shared-cache key
fn open_memory_interface() -> DbInterface {
    init_logging();
    let key = format!("itest-{}", Uuid::new_v4());
    DbInterface::new(
        None,
        Some(&key),
        DbInterfaceFlags {
            in_memory: true,
            ..Default::default()
        },
    )
    .unwrap()
}

/// Helper: registry seeded with the namespaces the tests reference
fn seeded_registry() -> Ontologies {
    let ontologies = Ontologies::new();
    ontologies.add_namespace(Namespace::new("http://ex/", "ex"));
    ontologies.add_namespace(Namespace::new("http://www.w3.org/2001/XMLSchema#", "xsd"));
    ontologies.add_namespace(Namespace::new(
        "http://www.w3.org/1999/02/22-rdf-syntax-ns#",
        "rdf",
    ));
    ontologies
}

fn add_class(ontologies: &Ontologies, uri: &str) {
    let class = Class::new();
    class.set_uri(ontologies, uri);
    ontologies.add_class(class);
}

#[test]
fn class_registration_and_name_derivation() {
    let ontologies = seeded_registry();

    let class = Class::new();
    class.set_uri(&ontologies, "http://ex/Thing");
    assert_eq!(class.name(), "ex:Thing");

    ontologies.add_class(class);
    let found = ontologies.get_class_by_uri("http://ex/Thing").unwrap();
    assert_eq!(found.name(), "ex:Thing");
}

#[test]
fn property_range_determines_data_type() {
    let ontologies = seeded_registry();
    add_class(&ontologies, "http://www.w3.org/2001/XMLSchema#integer");

    let property = Property::new();
    property.set_uri(&ontologies, "http://ex/pageCount");
    let range = ontologies
        .get_class_by_uri("http://www.w3.org/2001/XMLSchema#integer")
        .unwrap();
    property.set_range(&range);

    assert_eq!(property.data_type(&ontologies), PropertyType::Integer);
}

#[test]
fn table_names_follow_cardinality() {
    let ontologies = seeded_registry();
    add_class(&ontologies, "http://ex/Document");

    let property = Property::new();
    property.set_uri(&ontologies, "http://ex/keyword");
    let domain = ontologies.get_class_by_uri("http://ex/Document").unwrap();
    property.set_domain(&domain);

    assert_eq!(property.table_name(&ontologies), "ex:Document_ex:keyword");

    property.set_multiple_values(false);
    assert_eq!(property.table_name(&ontologies), "ex:Document");
}

#[test]
fn registry_backed_tables_round_trip_through_sqlite() {
    let ontologies = seeded_registry();
    add_class(&ontologies, "http://ex/Document");

    let property = Property::new();
    property.set_uri(&ontologies, "http://ex/title");
    let domain = ontologies.get_class_by_uri("http://ex/Document").unwrap();
    property.set_domain(&domain);
    property.set_multiple_values(false);

    let iface = open_memory_interface();

    // The class row table is named after the class's local name
    let table = property.table_name(&ontologies);
    iface
        .execute_sql(&format!(
            "CREATE TABLE \"{}\" (ID INTEGER PRIMARY KEY, \"ex:title\" TEXT)",
            table
        ))
        .unwrap();

    let mut insert = iface
        .create_statement(
            CacheKind::Update,
            &format!("INSERT INTO \"{}\" VALUES (?, ?)", table),
        )
        .unwrap();
    insert.bind_int(0, 1).unwrap();
    insert.bind_text(1, "annual report").unwrap();
    insert.execute(None).unwrap();

    let mut select = iface
        .create_statement(
            CacheKind::Select,
            &format!("SELECT \"ex:title\" FROM \"{}\"", table),
        )
        .unwrap();
    let values = select.get_values(PropertyType::String, None).unwrap();
    assert_eq!(values, vec![TypedValue::String("annual report".to_string())]);
}

#[test]
fn langstring_round_trip_through_bind_and_udf() {
    let iface = open_memory_interface();
    iface
        .execute_sql("CREATE TABLE t (ID INTEGER PRIMARY KEY, label BLOB)")
        .unwrap();

    let blob = LangString::new("hello", "en-US").to_blob();
    let mut insert = iface
        .create_statement(CacheKind::Update, "INSERT INTO t VALUES (1, ?)")
        .unwrap();
    insert.bind_bytes(0, &blob).unwrap();
    insert.execute(None).unwrap();

    let mut matching = iface
        .create_statement(
            CacheKind::Select,
            "SELECT ID FROM t WHERE SparqlLangMatches(label, 'en-US')",
        )
        .unwrap();
    assert_eq!(
        matching.get_values(PropertyType::Integer, None).unwrap(),
        vec![TypedValue::Integer(1)]
    );

    let mut missing = iface
        .create_statement(
            CacheKind::Select,
            "SELECT ID FROM t WHERE SparqlLangMatches(label, 'fr')",
        )
        .unwrap();
    assert!(missing
        .get_values(PropertyType::Integer, None)
        .unwrap()
        .is_empty());
}

#[test]
fn sparql_cursor_reports_annotated_value_types() {
    let iface = open_memory_interface();

    // Two user columns with shadow annotation columns carrying the
    // property-type codes for resource and string
    let sql = format!(
        "SELECT 'urn:bnode:42' AS v_subject, 'foo' AS v_object, {} AS t0, {} AS t1",
        PropertyType::Resource as i64,
        PropertyType::String as i64
    );
    let mut stmt = iface.create_statement(CacheKind::Select, &sql).unwrap();
    let mut cursor = stmt.start_sparql_cursor(2);

    assert!(cursor.next(None).unwrap());
    assert_eq!(cursor.get_n_columns(), 2);
    assert_eq!(cursor.get_variable_name(0), Some("subject"));
    assert_eq!(cursor.get_variable_name(1), Some("object"));
    assert_eq!(cursor.get_value_type(0), SparqlValueType::BlankNode);
    assert_eq!(cursor.get_value_type(1), SparqlValueType::String);

    assert!(!cursor.next(None).unwrap());
}

#[test]
fn cursor_close_contract_holds_across_interface() {
    let iface = open_memory_interface();
    iface.execute_sql("CREATE TABLE t (x INTEGER)").unwrap();
    iface
        .execute_sql("INSERT INTO t VALUES (1), (2), (3)")
        .unwrap();

    let mut stmt = iface
        .create_statement(CacheKind::Select, "SELECT x FROM t ORDER BY x")
        .unwrap();

    {
        let mut cursor = stmt.start_cursor();
        assert!(cursor.next(None).unwrap());
        assert!(iface.is_used());

        cursor.close();
        assert!(!cursor.next(None).unwrap());
        cursor.rewind();
        assert!(!cursor.next(None).unwrap());
    }

    assert!(!iface.is_used());

    // The statement is reusable after the cursor is gone
    let mut cursor = stmt.start_cursor();
    let mut count = 0;
    while cursor.next(None).unwrap() {
        count += 1;
    }
    assert_eq!(count, 3);
}

#[test]
fn statement_cache_eviction_keeps_recency_order() {
    let iface = open_memory_interface();
    iface.execute_sql("CREATE TABLE t (x INTEGER)").unwrap();
    iface.set_max_stmt_cache_size(CacheKind::Select, 3);

    // A, B, C, A, D: B is the LRU when D arrives
    for sql in [
        "SELECT x FROM t WHERE x = 1",
        "SELECT x FROM t WHERE x = 2",
        "SELECT x FROM t WHERE x = 3",
        "SELECT x FROM t WHERE x = 1",
        "SELECT x FROM t WHERE x = 4",
    ] {
        drop(iface.create_statement(CacheKind::Select, sql).unwrap());
    }

    // Evicted statements are freshly prepared and re-enter the cache;
    // resident ones come back borrowed from the cache
    let again = iface
        .create_statement(CacheKind::Select, "SELECT x FROM t WHERE x = 1")
        .unwrap();
    assert_eq!(again.kind(), CacheKind::Select);
}

#[test]
fn ontology_snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ontology.snapshot.json");

    {
        let ontologies = seeded_registry();
        add_class(&ontologies, "http://ex/Document");
        add_class(&ontologies, "http://www.w3.org/2001/XMLSchema#string");

        let property = Property::new();
        property.set_uri(&ontologies, "http://ex/title");
        let domain = ontologies.get_class_by_uri("http://ex/Document").unwrap();
        let range = ontologies
            .get_class_by_uri("http://www.w3.org/2001/XMLSchema#string")
            .unwrap();
        property.set_domain(&domain);
        property.set_range(&range);
        property.set_fulltext_indexed(true);
        ontologies.add_property(property);

        ontologies.write_snapshot(&path).unwrap();
    }

    let restored = Ontologies::new();
    restored.load_snapshot(&path).unwrap();

    let property = restored.get_property_by_uri("http://ex/title").unwrap();
    assert_eq!(property.data_type(&restored), PropertyType::String);
    assert!(property.fulltext_indexed(&restored));
    assert_eq!(
        property.domain(&restored).unwrap().uri(),
        "http://ex/Document"
    );
}

#[test]
fn sorted_registry_lists_classes_alphabetically() {
    let ontologies = seeded_registry();
    for tail in ["Video", "Audio", "Document"] {
        add_class(&ontologies, &format!("http://ex/{}", tail));
    }

    ontologies.sort();

    let names: Vec<String> = ontologies.get_classes().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["ex:Audio", "ex:Document", "ex:Video"]);
}

#[test]
fn file_backed_database_persists_between_interfaces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meta.db");

    {
        let iface = DbInterface::new(Some(&path), None, DbInterfaceFlags::default()).unwrap();
        iface
            .execute_sql(
                "CREATE TABLE Resource (ID INTEGER PRIMARY KEY, Uri TEXT);
                 INSERT INTO Resource VALUES (1, 'http://ex/persisted');",
            )
            .unwrap();
        iface.wal_checkpoint(true).unwrap();
    }

    let reopened = DbInterface::new(
        Some(&path),
        None,
        DbInterfaceFlags {
            readonly: true,
            ..Default::default()
        },
    )
    .unwrap();

    let mut stmt = reopened
        .create_statement(CacheKind::Select, "SELECT Uri FROM Resource")
        .unwrap();
    let values = stmt.get_values(PropertyType::String, None).unwrap();
    assert_eq!(
        values,
        vec![TypedValue::String("http://ex/persisted".to_string())]
    );
}
