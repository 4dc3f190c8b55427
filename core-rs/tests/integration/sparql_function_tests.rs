//! SPARQL Helper Function Integration Tests
//!
//! Drives the registered UDFs through a full interface, the way the query
//! surface uses them, and checks the cross-function properties: timestamp
//! round trips, unaccent against NFKD, parent/descendant implication and
//! the langString encoding.

use ontodb_core::{CacheKind, DbInterface, DbInterfaceFlags, PropertyType, TypedValue};
use uuid::Uuid;

fn open_interface() -> DbInterface {
    let key = format!("ftest-{}", Uuid::new_v4());
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

fn text(iface: &DbInterface, sql: &str) -> Option<String> {
    let mut stmt = iface.create_statement(CacheKind::Select, sql).unwrap();
    let mut cursor = stmt.start_cursor();
    assert!(cursor.next(None).unwrap());
    cursor.get_string(0)
}

fn integer(iface: &DbInterface, sql: &str) -> i64 {
    let mut stmt = iface.create_statement(CacheKind::Select, sql).unwrap();
    let mut cursor = stmt.start_cursor();
    assert!(cursor.next(None).unwrap());
    cursor.get_integer(0)
}

#[test]
fn format_time_round_trips_utc_timestamps() {
    let iface = open_interface();

    for stamp in [
        "1970-01-01T00:00:00Z",
        "2004-02-29T23:59:59Z",
        "2019-07-01T12:15:30Z",
        "2038-01-19T03:14:07Z",
    ] {
        let round = text(
            &iface,
            &format!("SELECT SparqlFormatTime(SparqlTimestamp('{}'))", stamp),
        );
        assert_eq!(round.as_deref(), Some(stamp));
    }
}

#[test]
fn replace_follows_xpath_backreference_rules() {
    let iface = open_interface();

    assert_eq!(
        text(
            &iface,
            "SELECT SparqlReplace('abcdef', '(a)(b)(c)', '$3$2$1')"
        )
        .as_deref(),
        Some("cbadef")
    );

    // Case-insensitive flag applies to the pattern
    assert_eq!(
        text(&iface, "SELECT SparqlReplace('aBcB', 'b', 'x', 'i')").as_deref(),
        Some("axcx")
    );
}

#[test]
fn unaccent_matches_nfkd_mark_removal() {
    use unicode_normalization::char::is_combining_mark;
    use unicode_normalization::UnicodeNormalization;

    let iface = open_interface();

    for input in ["café", "Ångström", "naïve", "łódź", "plain ascii"] {
        let via_udf = text(&iface, &format!("SELECT SparqlUnaccent('{}')", input)).unwrap();

        let expected: String = input.nfkd().filter(|c| !is_combining_mark(*c)).collect();
        assert_eq!(via_udf, expected, "input {}", input);
    }
}

/// uri_is_parent(u, v) implies uri_is_descendant(u, v), and
/// uri_is_descendant(u, u) is false.
#[test]
fn parent_implies_descendant() {
    let iface = open_interface();

    let pairs = [
        ("file:///home", "file:///home/user"),
        ("file:///home/", "file:///home/user/"),
        ("http://ex.org/a", "http://ex.org/a/b"),
    ];

    for (parent, child) in pairs {
        let is_parent = integer(
            &iface,
            &format!("SELECT SparqlUriIsParent('{}', '{}')", parent, child),
        );
        let is_descendant = integer(
            &iface,
            &format!("SELECT SparqlUriIsDescendant('{}', '{}')", parent, child),
        );

        assert_eq!(is_parent, 1, "{} should parent {}", parent, child);
        assert_eq!(is_descendant, 1, "parent implies descendant");
    }

    // Never a descendant of itself
    assert_eq!(
        integer(
            &iface,
            "SELECT SparqlUriIsDescendant('file:///home', 'file:///home')"
        ),
        0
    );
}

#[test]
fn grandchildren_are_descendants_but_not_children() {
    let iface = open_interface();

    assert_eq!(
        integer(
            &iface,
            "SELECT SparqlUriIsParent('file:///home', 'file:///home/a/b')"
        ),
        0
    );
    assert_eq!(
        integer(
            &iface,
            "SELECT SparqlUriIsDescendant('file:///home', 'file:///home/a/b')"
        ),
        1
    );
}

#[test]
fn strlang_blob_binds_and_matches() {
    let iface = open_interface();
    iface
        .execute_sql("CREATE TABLE labels (v BLOB)")
        .unwrap();
    iface
        .execute_sql("INSERT INTO labels SELECT SparqlStrLang('hello', 'en-US')")
        .unwrap();

    assert_eq!(
        integer(
            &iface,
            "SELECT SparqlLangMatches(v, 'en-US') FROM labels"
        ),
        1
    );
    assert_eq!(
        integer(&iface, "SELECT SparqlLangMatches(v, 'fr') FROM labels"),
        0
    );

    // The stored blob length covers text, separator and tag
    assert_eq!(
        integer(&iface, "SELECT length(v) FROM labels"),
        ("hello".len() + 1 + "en-US".len()) as i64
    );
}

#[test]
fn uuid_and_bnode_respect_resource_table() {
    let iface = open_interface();
    iface
        .execute_sql("CREATE TABLE Resource (ID INTEGER PRIMARY KEY, Uri TEXT)")
        .unwrap();

    let generated = text(&iface, "SELECT SparqlUUID('urn:uuid')").unwrap();
    assert!(generated.starts_with("urn:uuid:"));

    // Generated URIs are usable as fresh Resource rows
    iface
        .execute_sql(&format!(
            "INSERT INTO Resource (Uri) VALUES ('{}')",
            generated
        ))
        .unwrap();

    let bnode = text(&iface, "SELECT SparqlBNODE()").unwrap();
    assert!(bnode.starts_with("urn:bnode:"));
    assert_ne!(bnode, generated);
}

#[test]
fn print_iri_resolves_ids_and_blank_nodes() {
    let iface = open_interface();
    iface
        .execute_sql(
            "CREATE TABLE Resource (ID INTEGER PRIMARY KEY, Uri TEXT);
             INSERT INTO Resource VALUES (7, 'http://ex/seven');
             INSERT INTO Resource VALUES (8, '');",
        )
        .unwrap();

    assert_eq!(
        text(&iface, "SELECT SparqlPrintIRI(7)").as_deref(),
        Some("http://ex/seven")
    );
    assert_eq!(
        text(&iface, "SELECT SparqlPrintIRI(8)").as_deref(),
        Some("urn:bnode:8")
    );
}

#[test]
fn collations_order_query_results() {
    let iface = open_interface();
    iface
        .execute_sql(
            "CREATE TABLE titles (t TEXT);
             INSERT INTO titles VALUES ('the Zebra'), ('Apple'), ('An orange');",
        )
        .unwrap();

    let mut stmt = iface
        .create_statement(
            CacheKind::Select,
            "SELECT t FROM titles ORDER BY t COLLATE ONTODB_TITLE_COLLATION",
        )
        .unwrap();

    let values = stmt.get_values(PropertyType::String, None).unwrap();
    assert_eq!(
        values,
        vec![
            TypedValue::String("Apple".to_string()),
            TypedValue::String("An orange".to_string()),
            TypedValue::String("the Zebra".to_string()),
        ]
    );
}

#[test]
fn default_collation_ignores_case_and_accents() {
    let iface = open_interface();
    iface
        .execute_sql(
            "CREATE TABLE words (w TEXT);
             INSERT INTO words VALUES ('zebra'), ('Émile'), ('apple');",
        )
        .unwrap();

    let mut stmt = iface
        .create_statement(
            CacheKind::Select,
            "SELECT w FROM words ORDER BY w COLLATE ONTODB_COLLATION",
        )
        .unwrap();

    let values = stmt.get_values(PropertyType::String, None).unwrap();
    assert_eq!(
        values,
        vec![
            TypedValue::String("apple".to_string()),
            TypedValue::String("Émile".to_string()),
            TypedValue::String("zebra".to_string()),
        ]
    );
}

#[test]
fn checksum_digests_are_stable() {
    let iface = open_interface();

    assert_eq!(
        text(&iface, "SELECT SparqlChecksum('', 'sha256')").as_deref(),
        Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
    );
    assert_eq!(
        text(&iface, "SELECT SparqlChecksum('abc', 'md5')").as_deref(),
        Some("900150983cd24fb0d6963f7d28e17f72")
    );
}

#[test]
fn geo_distances_are_consistent() {
    let iface = open_interface();

    let mut stmt = iface
        .create_statement(
            CacheKind::Select,
            "SELECT SparqlHaversineDistance(48.8566, 52.52, 2.3522, 13.405),
                    SparqlCartesianDistance(48.8566, 52.52, 2.3522, 13.405)",
        )
        .unwrap();
    let mut cursor = stmt.start_cursor();
    assert!(cursor.next(None).unwrap());

    let haversine = cursor.get_double(0);
    let cartesian = cursor.get_double(1);

    // Paris-Berlin is roughly 878 km; the planar approximation lands in the
    // same order of magnitude
    assert!((haversine - 878_000.0).abs() < 10_000.0);
    assert!(cartesian > 500_000.0 && cartesian < 1_500_000.0);
}
