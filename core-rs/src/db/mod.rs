/**
 * db module
 *
 * - interface: SQLite-backed interface owning collations, helper functions
 *   and the statement caches
 * - statement: prepared statement wrapper with positional binds
 * - cursor: pull cursor with SPARQL value-type annotations
 * - mru: most-recently-used statement cache policy
 * - functions: SPARQL helper functions registered as SQLite UDFs
 * - fts: full-text search table lifecycle
 * - value: value kinds crossing the SQL boundary
 */

pub mod cursor;
pub mod fts;
pub mod functions;
pub mod interface;
pub mod mru;
pub mod statement;
pub mod value;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use cursor::DbCursor;
pub use fts::FtsColumn;
pub use interface::{DbInterface, DbInterfaceFlags};
pub use statement::{CacheKind, DbStatement};
pub use value::{BindValue, LangString, SparqlValueType, TypedValue, BNODE_PREFIX};

/// Cooperative cancellation token.
///
/// An interface holds at most one in-flight token; the progress handler
/// polls it every 100 VM steps and aborts the running statement, which then
/// surfaces as `StoreError::Interrupted`.
#[derive(Debug, Clone, Default)]
pub struct Cancellable {
    flag: Arc<AtomicBool>,
}

impl Cancellable {
    pub fn new() -> Cancellable {
        Cancellable::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
