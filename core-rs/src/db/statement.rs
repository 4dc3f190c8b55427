/**
 * statement.rs
 * Prepared statement wrapper
 *
 * Binds are positional and 0-based from the caller's perspective; SQLite's
 * 1-based indexes are an implementation detail. Execution steps to
 * completion with a bounded retry on shared-cache lock contention, and
 * releases the MRU borrow on drop.
 */

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use rusqlite::types::{Null, Value};
use rusqlite::CachedStatement;

use crate::datetime::{format_iso8601, parse_iso8601};
use crate::db::cursor::DbCursor;
use crate::db::interface::{
    is_locked_sharedcache, DbInterface, LOCKED_RETRY_BACKOFF, LOCKED_RETRY_MAX,
};
use crate::db::value::{BindValue, TypedValue};
use crate::db::Cancellable;
use crate::errors::{Result, StoreError};
use crate::ontology::PropertyType;

/// Which MRU a statement is cached in, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    None,
    Select,
    Update,
}

pub(crate) enum StmtInner<'conn> {
    Plain(rusqlite::Statement<'conn>),
    Cached(CachedStatement<'conn>),
}

pub struct DbStatement<'conn> {
    iface: &'conn DbInterface,
    inner: StmtInner<'conn>,
    sql: String,
    kind: CacheKind,
}

impl<'conn> DbStatement<'conn> {
    pub(crate) fn new(
        iface: &'conn DbInterface,
        inner: StmtInner<'conn>,
        sql: String,
        kind: CacheKind,
    ) -> DbStatement<'conn> {
        DbStatement {
            iface,
            inner,
            sql,
            kind,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    pub(crate) fn interface(&self) -> &'conn DbInterface {
        self.iface
    }

    pub(crate) fn stmt_mut(&mut self) -> &mut rusqlite::Statement<'conn> {
        match &mut self.inner {
            StmtInner::Plain(stmt) => stmt,
            StmtInner::Cached(stmt) => stmt,
        }
    }

    fn stmt(&self) -> &rusqlite::Statement<'conn> {
        match &self.inner {
            StmtInner::Plain(stmt) => stmt,
            StmtInner::Cached(stmt) => stmt,
        }
    }

    pub fn column_count(&self) -> usize {
        self.stmt().column_count()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.stmt()
            .column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn bind_int(&mut self, index: usize, value: i64) -> Result<()> {
        self.stmt_mut()
            .raw_bind_parameter(index + 1, value)
            .map_err(StoreError::from)
    }

    pub fn bind_double(&mut self, index: usize, value: f64) -> Result<()> {
        self.stmt_mut()
            .raw_bind_parameter(index + 1, value)
            .map_err(StoreError::from)
    }

    pub fn bind_null(&mut self, index: usize) -> Result<()> {
        self.stmt_mut()
            .raw_bind_parameter(index + 1, Null)
            .map_err(StoreError::from)
    }

    /// Text values are copied by SQLite.
    pub fn bind_text(&mut self, index: usize, value: &str) -> Result<()> {
        self.stmt_mut()
            .raw_bind_parameter(index + 1, value)
            .map_err(StoreError::from)
    }

    /// Length-aware blob bind; supports the embedded NUL of langString
    /// payloads.
    pub fn bind_bytes(&mut self, index: usize, value: &[u8]) -> Result<()> {
        self.stmt_mut()
            .raw_bind_parameter(index + 1, Value::Blob(value.to_vec()))
            .map_err(StoreError::from)
    }

    /// Bound as an ISO 8601 string.
    pub fn bind_datetime(&mut self, index: usize, value: &DateTime<FixedOffset>) -> Result<()> {
        let text = format_iso8601(value);
        self.stmt_mut()
            .raw_bind_parameter(index + 1, text)
            .map_err(StoreError::from)
    }

    /// Generic tagged bind.
    pub fn bind_value(&mut self, index: usize, value: &BindValue) -> Result<()> {
        match value {
            BindValue::Null => self.bind_null(index),
            BindValue::Integer(v) => self.bind_int(index, *v),
            BindValue::Double(v) => self.bind_double(index, *v),
            BindValue::Text(v) => self.bind_text(index, v),
            BindValue::Bytes(v) => self.bind_bytes(index, v),
            BindValue::DateTime(v) => self.bind_datetime(index, v),
        }
    }

    /// Step the statement to completion, returning the number of changed
    /// rows.
    ///
    /// Shared-cache lock contention from a concurrent writer is retried with
    /// a bounded backoff before surfacing as a query error.
    pub fn execute(&mut self, cancellable: Option<&Cancellable>) -> Result<usize> {
        let iface = self.iface;
        let _guard = iface.lock_entry();

        if let Some(token) = cancellable {
            if token.is_cancelled() {
                return Err(StoreError::Interrupted);
            }
        }

        iface.ref_use();
        iface.set_cancellable(cancellable.cloned());

        let mut attempts = 0;
        let result = loop {
            match self.stmt_mut().raw_execute() {
                Ok(changes) => break Ok(changes),
                Err(e) if is_locked_sharedcache(&e) && attempts < LOCKED_RETRY_MAX => {
                    attempts += 1;
                    std::thread::sleep(LOCKED_RETRY_BACKOFF);
                }
                Err(e) => break Err(StoreError::from(e)),
            }
        };

        iface.clear_cancellable();
        iface.unref_use();

        result
    }

    /// Step the statement collecting column 0 into a typed list, mapping SQL
    /// storage to the supplied property value type. NULL rows are skipped.
    pub fn get_values(
        &mut self,
        property_type: PropertyType,
        cancellable: Option<&Cancellable>,
    ) -> Result<Vec<TypedValue>> {
        let iface = self.iface;
        let _guard = iface.lock_entry();

        iface.ref_use();
        iface.set_cancellable(cancellable.cloned());

        let result = collect_values(self.stmt_mut(), property_type, cancellable);

        iface.clear_cancellable();
        iface.unref_use();

        result
    }

    /// Start a cursor over all SQLite columns. The cursor borrows the
    /// statement exclusively: a second concurrent cursor on the same
    /// statement is rejected by the compiler.
    pub fn start_cursor(&mut self) -> DbCursor<'_, 'conn> {
        DbCursor::new(self, 0)
    }

    /// Start a cursor exposing `n_columns` user columns; columns
    /// `n_columns..2*n_columns` carry value-type annotations.
    pub fn start_sparql_cursor(&mut self, n_columns: usize) -> DbCursor<'_, 'conn> {
        DbCursor::new(self, n_columns)
    }
}

impl Drop for DbStatement<'_> {
    fn drop(&mut self) {
        self.iface.mark_statement_released(self.kind, &self.sql);
    }
}

fn collect_values(
    stmt: &mut rusqlite::Statement<'_>,
    property_type: PropertyType,
    cancellable: Option<&Cancellable>,
) -> Result<Vec<TypedValue>> {
    let mut values = Vec::new();
    let mut rows = stmt.raw_query();

    loop {
        if let Some(token) = cancellable {
            if token.is_cancelled() {
                return Err(StoreError::Interrupted);
            }
        }

        let row = match rows.next() {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => return Err(StoreError::from(e)),
        };

        let value: Value = row.get(0)?;
        if matches!(value, Value::Null) {
            continue;
        }

        let typed = match property_type {
            PropertyType::Unknown | PropertyType::String => {
                TypedValue::String(value_to_text(&value))
            }
            PropertyType::LangString => TypedValue::LangString(value_to_bytes(value)),
            PropertyType::Double => TypedValue::Double(value_to_f64(&value)),
            PropertyType::Boolean | PropertyType::Integer | PropertyType::Resource => {
                TypedValue::Integer(value_to_i64(&value))
            }
            PropertyType::Date | PropertyType::DateTime => match &value {
                Value::Integer(epoch) => {
                    let datetime = Utc
                        .timestamp_opt(*epoch, 0)
                        .single()
                        .ok_or_else(|| {
                            StoreError::Time(format!("epoch {} is out of range", epoch))
                        })?
                        .fixed_offset();
                    TypedValue::DateTime(datetime)
                }
                other => TypedValue::DateTime(parse_iso8601(&value_to_text(other))?),
            },
        };

        values.push(typed);
    }

    Ok(values)
}

pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        // Reading a blob as text stops at the embedded NUL, like SQLite's
        // own text conversion of langString payloads
        Value::Blob(v) => {
            let end = v.iter().position(|b| *b == 0).unwrap_or(v.len());
            String::from_utf8_lossy(&v[..end]).into_owned()
        }
    }
}

pub(crate) fn value_to_bytes(value: Value) -> Vec<u8> {
    match value {
        Value::Blob(v) => v,
        Value::Text(v) => v.into_bytes(),
        other => value_to_text(&other).into_bytes(),
    }
}

pub(crate) fn value_to_i64(value: &Value) -> i64 {
    match value {
        Value::Integer(v) => *v,
        Value::Real(v) => *v as i64,
        Value::Text(v) => v.parse().unwrap_or(0),
        _ => 0,
    }
}

pub(crate) fn value_to_f64(value: &Value) -> f64 {
    match value {
        Value::Integer(v) => *v as f64,
        Value::Real(v) => *v,
        Value::Text(v) => v.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
