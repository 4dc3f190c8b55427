/**
 * fts.rs
 * Full-text search integration
 *
 * Per attached database a single virtual table "fts5" exposes the union of
 * fulltext-indexed text properties, backed by a "fts_view" projection that
 * gathers scalar columns and GROUP_CONCAT'ed multi-valued columns keyed by
 * resource ID. Indexing is driven per row: update_text pulls the current
 * values out of the view, delete_text writes the FTS5 'delete' tombstone.
 */

use rusqlite::Connection;

use crate::errors::{Result, StoreError};

/// One fulltext-indexed property projected into the FTS table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtsColumn {
    /// Column name in the FTS table (the property's local name).
    pub name: String,
    /// Source table holding the property values.
    pub table: String,
    /// Source column within that table.
    pub column: String,
    /// Multi-valued properties are concatenated per resource.
    pub multivalued: bool,
}

const FTS_TABLE: &str = "fts5";
const FTS_VIEW: &str = "fts_view";

fn fts_error(context: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Fts(format!("{}: {}", context, err))
}

/// Verify the FTS5 module is available in this build.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE temp.fts_module_check USING fts5(x);
         DROP TABLE temp.fts_module_check;",
    )
    .map_err(|e| fts_error("FTS module unavailable", e))
}

fn quoted_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(",")
}

fn view_query(database: &str, columns: &[FtsColumn]) -> String {
    let mut projections = Vec::with_capacity(columns.len());

    for column in columns {
        let select = if column.multivalued {
            format!(
                "(SELECT GROUP_CONCAT(\"{col}\", ' ') FROM \"{db}\".\"{table}\" \
                 WHERE \"{table}\".\"ID\" = \"Resource\".\"ID\") AS \"{name}\"",
                col = column.column,
                db = database,
                table = column.table,
                name = column.name
            )
        } else {
            format!(
                "(SELECT \"{col}\" FROM \"{db}\".\"{table}\" \
                 WHERE \"{table}\".\"ID\" = \"Resource\".\"ID\") AS \"{name}\"",
                col = column.column,
                db = database,
                table = column.table,
                name = column.name
            )
        };
        projections.push(select);
    }

    format!(
        "CREATE VIEW \"{db}\".\"{view}\" AS SELECT \"Resource\".\"ID\" AS rowid, {projections} \
         FROM \"{db}\".\"Resource\"",
        db = database,
        view = FTS_VIEW,
        projections = projections.join(", ")
    )
}

/// Create the fts_view projection and the fts5 virtual table over it.
pub fn create_table(conn: &Connection, database: &str, columns: &[FtsColumn]) -> Result<()> {
    if columns.is_empty() {
        return Ok(());
    }

    conn.execute_batch(&view_query(database, columns))
        .map_err(|e| fts_error("FTS tables creation failed", e))?;

    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let create = format!(
        "CREATE VIRTUAL TABLE \"{db}\".\"{table}\" USING fts5({columns}, \
         content=\"{view}\", content_rowid=\"rowid\", \
         tokenize=\"unicode61 remove_diacritics 2\")",
        db = database,
        table = FTS_TABLE,
        columns = quoted_list(&names),
        view = FTS_VIEW
    );

    conn.execute_batch(&create)
        .map_err(|e| fts_error("FTS tables creation failed", e))
}

/// Current FTS column names, empty when the table does not exist.
fn existing_columns(conn: &Connection, database: &str) -> Vec<String> {
    let sql = format!("PRAGMA \"{}\".table_info(\"{}\")", database, FTS_TABLE);

    let mut columns = Vec::new();
    if let Ok(mut stmt) = conn.prepare(&sql) {
        if let Ok(mut rows) = stmt.query([]) {
            while let Ok(Some(row)) = rows.next() {
                if let Ok(name) = row.get::<_, String>(1) {
                    columns.push(name);
                }
            }
        }
    }

    columns
}

/// Bring the FTS table in line with the current ontology shape. A changed
/// column set recreates the table and rebuilds the tokens.
pub fn alter_table(conn: &Connection, database: &str, columns: &[FtsColumn]) -> Result<()> {
    let current = existing_columns(conn, database);
    let desired: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    if current == desired {
        return Ok(());
    }

    delete_table(conn, database)?;
    create_table(conn, database, columns)?;

    if !columns.is_empty() {
        rebuild_tokens(conn, database)?;
    }

    Ok(())
}

pub fn delete_table(conn: &Connection, database: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "DROP TABLE IF EXISTS \"{db}\".\"{table}\";
         DROP VIEW IF EXISTS \"{db}\".\"{view}\";",
        db = database,
        table = FTS_TABLE,
        view = FTS_VIEW
    ))
    .map_err(|e| fts_error("FTS tables deletion failed", e))
}

pub fn rebuild_tokens(conn: &Connection, database: &str) -> Result<()> {
    conn.execute_batch(&format!(
        "INSERT INTO \"{db}\".\"{table}\"(\"{table}\") VALUES('rebuild')",
        db = database,
        table = FTS_TABLE
    ))
    .map_err(|e| fts_error("FTS token rebuild failed", e))
}

/// INSERT ... SELECT pulling one resource's current text out of the view.
pub fn update_text_query(database: &str, properties: &[&str]) -> String {
    let props = quoted_list(properties);

    format!(
        "INSERT INTO \"{db}\".{table} (ROWID, {props}) \
         SELECT ROWID, {props} FROM \"{db}\".{view} \
         WHERE ROWID = ? AND COALESCE({props}, NULL) IS NOT NULL",
        db = database,
        table = FTS_TABLE,
        view = FTS_VIEW,
        props = props
    )
}

/// The FTS5 'delete' tombstone for one resource.
pub fn delete_text_query(database: &str, properties: &[&str]) -> String {
    let props = quoted_list(properties);

    format!(
        "INSERT INTO \"{db}\".{table} ({table}, ROWID, {props}) \
         SELECT 'delete', ROWID, {props} FROM \"{db}\".{view} \
         WHERE ROWID = ? AND COALESCE({props}, NULL) IS NOT NULL",
        db = database,
        table = FTS_TABLE,
        view = FTS_VIEW,
        props = props
    )
}
