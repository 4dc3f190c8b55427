/**
 * cursor.rs
 * Pull cursor over a prepared statement
 *
 * The cursor borrows its statement exclusively for its whole lifetime, which
 * is the statement-in-use pin: a second cursor on the same statement cannot
 * be constructed while one is open. Rows are pulled from SQLite on the first
 * `next()` with a cancellation check per row; `rewind()` discards them so
 * the query re-executes, and `close()` detaches the cursor from SQLite
 * entirely.
 *
 * When constructed with `n_columns > 0`, columns `n_columns..2*n_columns`
 * carry property-type annotations used to answer `get_value_type`.
 */

use std::collections::VecDeque;

use rusqlite::types::Value;

use crate::db::interface::DbInterface;
use crate::db::statement::{value_to_f64, value_to_i64, value_to_text, DbStatement};
use crate::db::value::{SparqlValueType, BNODE_PREFIX};
use crate::db::Cancellable;
use crate::errors::{Result, StoreError};
use crate::ontology::PropertyType;

pub struct DbCursor<'stmt, 'conn> {
    stmt: &'stmt mut DbStatement<'conn>,
    iface: &'conn DbInterface,
    names: Vec<String>,
    rows: Option<VecDeque<Vec<Value>>>,
    current: Option<Vec<Value>>,
    n_columns: usize,
    finished: bool,
    closed: bool,
}

impl<'stmt, 'conn> DbCursor<'stmt, 'conn> {
    pub(crate) fn new(
        stmt: &'stmt mut DbStatement<'conn>,
        n_columns: usize,
    ) -> DbCursor<'stmt, 'conn> {
        let iface = stmt.interface();
        let names = stmt.column_names();

        // Keep the interface alive from the caller's perspective while the
        // cursor is open
        iface.ref_use();

        DbCursor {
            stmt,
            iface,
            names,
            rows: None,
            current: None,
            n_columns,
            finished: false,
            closed: false,
        }
    }

    fn fill(&mut self, cancellable: Option<&Cancellable>) -> Result<()> {
        let _guard = self.iface.lock_entry();

        self.iface.set_cancellable(cancellable.cloned());
        let result = Self::run_query(&mut *self.stmt, cancellable);
        self.iface.clear_cancellable();

        match result {
            Ok(collected) => {
                self.rows = Some(collected);
                Ok(())
            }
            Err(e) => {
                // A failed advance finalizes the cursor
                self.finished = true;
                self.rows = Some(VecDeque::new());
                Err(e)
            }
        }
    }

    fn run_query(
        stmt: &mut DbStatement<'_>,
        cancellable: Option<&Cancellable>,
    ) -> Result<VecDeque<Vec<Value>>> {
        let column_count = stmt.column_count();
        let mut collected = VecDeque::new();

        let raw = stmt.stmt_mut();
        let mut rows = raw.raw_query();

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

            let mut values = Vec::with_capacity(column_count);
            for index in 0..column_count {
                let value: Value = row.get(index)?;
                values.push(value);
            }
            collected.push_back(values);
        }

        Ok(collected)
    }

    /// Advance one row. Returns false on DONE; propagates cancellation and
    /// query errors, after which the cursor is finished.
    pub fn next(&mut self, cancellable: Option<&Cancellable>) -> Result<bool> {
        if self.closed || self.finished {
            return Ok(false);
        }

        if self.rows.is_none() {
            self.fill(cancellable)?;
        }

        match self.rows.as_mut().and_then(|rows| rows.pop_front()) {
            Some(row) => {
                self.current = Some(row);
                Ok(true)
            }
            None => {
                self.current = None;
                self.finished = true;
                Ok(false)
            }
        }
    }

    /// Advance on a blocking-capable worker.
    pub async fn next_async(&mut self, cancellable: Option<&Cancellable>) -> Result<bool> {
        tokio::task::block_in_place(|| self.next(cancellable))
    }

    /// Reset to before the first row; the next advance re-executes the
    /// query. No-op on a closed cursor.
    pub fn rewind(&mut self) {
        if self.closed {
            return;
        }

        self.rows = None;
        self.current = None;
        self.finished = false;
    }

    /// Release the statement. Further `next()`/`rewind()` calls return false
    /// or do nothing, without touching SQLite.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }

        self.closed = true;
        self.finished = true;
        self.rows = None;
        self.current = None;
        self.iface.unref_use();
    }

    /// Logical column count: the SQLite column count, or the user column
    /// count when value-type annotations are present.
    pub fn get_n_columns(&self) -> usize {
        if self.n_columns == 0 {
            self.names.len()
        } else {
            self.n_columns
        }
    }

    /// Column name with the internal `v_` prefix stripped.
    pub fn get_variable_name(&self, column: usize) -> Option<&str> {
        if self.n_columns > 0 && column >= self.n_columns {
            return None;
        }

        let name = self.names.get(column)?.as_str();
        Some(name.strip_prefix("v_").unwrap_or(name))
    }

    fn current_value(&self, column: usize) -> Option<&Value> {
        if self.n_columns > 0 && column >= self.n_columns {
            return None;
        }

        self.current.as_ref()?.get(column)
    }

    pub fn get_integer(&self, column: usize) -> i64 {
        self.current_value(column).map(value_to_i64).unwrap_or(0)
    }

    pub fn get_double(&self, column: usize) -> f64 {
        self.current_value(column).map(value_to_f64).unwrap_or(0.0)
    }

    pub fn get_string(&self, column: usize) -> Option<String> {
        match self.current_value(column) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value_to_text(value)),
        }
    }

    pub fn get_boolean(&self, column: usize) -> bool {
        self.get_string(column).as_deref() == Some("true")
    }

    /// The SPARQL value type of a column.
    ///
    /// With annotations present the shadow column decides; a NULL data
    /// column is unbound, and an annotated resource whose value begins with
    /// `urn:bnode:` reports as a blank node. Without annotations the SQLite
    /// storage class is mapped directly.
    pub fn get_value_type(&self, column: usize) -> SparqlValueType {
        if column >= self.get_n_columns() {
            return SparqlValueType::Unbound;
        }

        let current = match &self.current {
            Some(current) => current,
            None => return SparqlValueType::Unbound,
        };

        if self.n_columns > 0 {
            if let Some(annotation) = current.get(column + self.n_columns) {
                let data_is_null = matches!(current.get(column), None | Some(Value::Null));
                if data_is_null {
                    return SparqlValueType::Unbound;
                }

                if let Some(property_type) = PropertyType::from_code(value_to_i64(annotation)) {
                    match property_type {
                        PropertyType::Unknown => {}
                        PropertyType::String | PropertyType::LangString => {
                            return SparqlValueType::String
                        }
                        PropertyType::Boolean => return SparqlValueType::Boolean,
                        PropertyType::Integer => return SparqlValueType::Integer,
                        PropertyType::Double => return SparqlValueType::Double,
                        PropertyType::Date | PropertyType::DateTime => {
                            return SparqlValueType::DateTime
                        }
                        PropertyType::Resource => {
                            let is_bnode = self
                                .get_string(column)
                                .map(|value| value.starts_with(BNODE_PREFIX))
                                .unwrap_or(false);
                            return if is_bnode {
                                SparqlValueType::BlankNode
                            } else {
                                SparqlValueType::Uri
                            };
                        }
                    }
                }
            }
        }

        match current.get(column) {
            None | Some(Value::Null) => SparqlValueType::Unbound,
            Some(Value::Integer(_)) => SparqlValueType::Integer,
            Some(Value::Real(_)) => SparqlValueType::Double,
            Some(_) => SparqlValueType::String,
        }
    }
}

impl Drop for DbCursor<'_, '_> {
    fn drop(&mut self) {
        if !self.closed {
            self.close();
        }
    }
}
