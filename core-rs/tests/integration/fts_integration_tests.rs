//! FTS Integration Tests
//!
//! Drives the full-text search lifecycle through the interface: table and
//! view creation, per-row indexing and tombstones, shape changes, token
//! rebuilds and the attached-database variant.

use ontodb_core::{
    CacheKind, DbInterface, DbInterfaceFlags, FtsColumn, PropertyType, TypedValue,
};
use uuid::Uuid;

fn open_interface() -> DbInterface {
    let key = format!("fts-test-{}", Uuid::new_v4());
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

fn document_columns() -> Vec<FtsColumn> {
    vec![
        FtsColumn {
            name: "title".to_string(),
            table: "Document".to_string(),
            column: "title".to_string(),
            multivalued: false,
        },
        FtsColumn {
            name: "keyword".to_string(),
            table: "Document_keyword".to_string(),
            column: "keyword".to_string(),
            multivalued: true,
        },
    ]
}

fn create_document_schema(iface: &DbInterface, database: &str) {
    iface
        .execute_sql(&format!(
            "CREATE TABLE \"{db}\".Resource (ID INTEGER PRIMARY KEY, Uri TEXT);
             CREATE TABLE \"{db}\".Document (ID INTEGER PRIMARY KEY, title TEXT);
             CREATE TABLE \"{db}\".Document_keyword (ID INTEGER, keyword TEXT);",
            db = database
        ))
        .unwrap();
}

fn insert_document(iface: &DbInterface, database: &str, id: i64, title: &str, keywords: &[&str]) {
    iface
        .execute_sql(&format!(
            "INSERT INTO \"{db}\".Resource VALUES ({id}, 'http://ex/doc{id}');
             INSERT INTO \"{db}\".Document VALUES ({id}, '{title}');",
            db = database,
            id = id,
            title = title
        ))
        .unwrap();

    for keyword in keywords {
        iface
            .execute_sql(&format!(
                "INSERT INTO \"{db}\".Document_keyword VALUES ({id}, '{kw}')",
                db = database,
                id = id,
                kw = keyword
            ))
            .unwrap();
    }
}

fn search(iface: &DbInterface, database: &str, term: &str) -> Vec<i64> {
    let mut stmt = iface
        .create_statement(
            CacheKind::Select,
            &format!(
                "SELECT ROWID FROM \"{}\".fts5 WHERE fts5 MATCH '{}' ORDER BY ROWID",
                database, term
            ),
        )
        .unwrap();

    stmt.get_values(PropertyType::Integer, None)
        .unwrap()
        .into_iter()
        .map(|value| match value {
            TypedValue::Integer(id) => id,
            other => panic!("unexpected value {:?}", other),
        })
        .collect()
}

#[test]
fn fts_lifecycle_on_main_database() {
    let iface = open_interface();
    iface.fts_init_db().unwrap();

    create_document_schema(&iface, "main");
    iface.fts_create_table("main", &document_columns()).unwrap();

    insert_document(&iface, "main", 1, "annual report", &["finance", "quarterly"]);
    insert_document(&iface, "main", 2, "holiday photos", &["travel"]);

    iface
        .fts_update_text("main", 1, &["title", "keyword"])
        .unwrap();
    iface
        .fts_update_text("main", 2, &["title", "keyword"])
        .unwrap();

    assert_eq!(search(&iface, "main", "report"), vec![1]);
    assert_eq!(search(&iface, "main", "quarterly"), vec![1]);
    assert_eq!(search(&iface, "main", "travel"), vec![2]);
    assert!(search(&iface, "main", "nothing").is_empty());
}

#[test]
fn fts_delete_text_removes_from_index() {
    let iface = open_interface();
    create_document_schema(&iface, "main");
    iface.fts_create_table("main", &document_columns()).unwrap();

    insert_document(&iface, "main", 1, "annual report", &[]);
    iface
        .fts_update_text("main", 1, &["title", "keyword"])
        .unwrap();
    assert_eq!(search(&iface, "main", "report"), vec![1]);

    iface
        .fts_delete_text("main", 1, &["title", "keyword"])
        .unwrap();
    assert!(search(&iface, "main", "report").is_empty());
}

#[test]
fn fts_alter_table_follows_ontology_shape() {
    let iface = open_interface();
    create_document_schema(&iface, "main");
    iface.fts_create_table("main", &document_columns()).unwrap();

    insert_document(&iface, "main", 1, "annual report", &["finance"]);
    iface
        .fts_update_text("main", 1, &["title", "keyword"])
        .unwrap();

    // Removing the keyword column reindexes titles only
    let reduced = vec![document_columns()[0].clone()];
    iface.fts_alter_table("main", &reduced).unwrap();

    assert_eq!(search(&iface, "main", "report"), vec![1]);
    assert!(search(&iface, "main", "finance").is_empty());
}

#[test]
fn fts_rebuild_tokens_reindexes_existing_rows() {
    let iface = open_interface();
    create_document_schema(&iface, "main");
    iface.fts_create_table("main", &document_columns()).unwrap();

    // Rows inserted before any update_text call are picked up by a rebuild
    insert_document(&iface, "main", 1, "annual report", &["finance"]);
    iface.fts_rebuild_tokens("main").unwrap();

    assert_eq!(search(&iface, "main", "report"), vec![1]);
    assert_eq!(search(&iface, "main", "finance"), vec![1]);
}

#[test]
fn fts_works_on_attached_database() {
    let iface = open_interface();
    iface.attach_database(None, "aux").unwrap();

    create_document_schema(&iface, "aux");
    iface.fts_create_table("aux", &document_columns()).unwrap();

    insert_document(&iface, "aux", 1, "attached notes", &["memo"]);
    iface
        .fts_update_text("aux", 1, &["title", "keyword"])
        .unwrap();

    assert_eq!(search(&iface, "aux", "notes"), vec![1]);
    assert_eq!(search(&iface, "aux", "memo"), vec![1]);

    iface.fts_delete_table("aux").unwrap();
    iface.detach_database("aux").unwrap();
}

#[test]
fn fts_delete_table_then_recreate() {
    let iface = open_interface();
    create_document_schema(&iface, "main");

    iface.fts_create_table("main", &document_columns()).unwrap();
    iface.fts_delete_table("main").unwrap();
    iface.fts_create_table("main", &document_columns()).unwrap();

    insert_document(&iface, "main", 1, "fresh start", &[]);
    iface
        .fts_update_text("main", 1, &["title", "keyword"])
        .unwrap();
    assert_eq!(search(&iface, "main", "fresh"), vec![1]);
}

#[test]
fn diacritics_are_folded_by_the_tokenizer() {
    let iface = open_interface();
    create_document_schema(&iface, "main");
    iface.fts_create_table("main", &document_columns()).unwrap();

    insert_document(&iface, "main", 1, "café résumé", &[]);
    iface
        .fts_update_text("main", 1, &["title", "keyword"])
        .unwrap();

    // unicode61 with remove_diacritics matches the unaccented form
    assert_eq!(search(&iface, "main", "cafe"), vec![1]);
    assert_eq!(search(&iface, "main", "resume"), vec![1]);
}
