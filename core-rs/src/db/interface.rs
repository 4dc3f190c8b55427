/**
 * interface.rs
 * SQLite-backed database interface
 *
 * Owns the connection, registers the Unicode collations and the SPARQL
 * helper functions, applies the configured pragmas, and hands out prepared
 * statements through two MRU caches (SELECT and UPDATE). Cancellation is
 * cooperative: a progress handler polls the in-flight token every 100 VM
 * steps.
 */

use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use md5::{Digest, Md5};
use rusqlite::{Connection, OpenFlags};

use crate::collation::{
    parse_title_articles, title_compare, unicode_compare, COLLATION_NAME, TITLE_COLLATION_NAME,
};
use crate::config::DbConfig;
use crate::db::fts::{self, FtsColumn};
use crate::db::functions;
use crate::db::mru::{StatementMru, StmtEntry};
use crate::db::statement::{CacheKind, DbStatement, StmtInner};
use crate::db::Cancellable;
use crate::errors::{Result, StoreError};

/// Number of VM steps between cancellation polls.
const PROGRESS_HANDLER_STEPS: i32 = 100;

/// Bounded retry for shared-cache lock contention between interfaces
/// attached to the same in-memory database.
pub(crate) const LOCKED_RETRY_MAX: u32 = 1000;
pub(crate) const LOCKED_RETRY_BACKOFF: Duration = Duration::from_millis(1);

/// Open flags for an interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DbInterfaceFlags {
    pub readonly: bool,
    /// Shared in-memory database, keyed by the caller-supplied cache key so
    /// several interfaces can attach the same database.
    pub in_memory: bool,
    /// Serialize every public entry point with the interface's own mutex.
    pub use_mutex: bool,
}

pub struct DbInterface {
    conn: Connection,
    filename: Option<PathBuf>,
    shared_cache_key: Option<String>,
    flags: DbInterfaceFlags,
    config: DbConfig,
    select_mru: RefCell<StatementMru>,
    update_mru: RefCell<StatementMru>,
    cancellable: Arc<Mutex<Option<Cancellable>>>,
    title_articles: Arc<Mutex<Vec<String>>>,
    entry_mutex: Option<Mutex<()>>,
    n_users: Cell<u32>,
}

impl DbInterface {
    /// Open a database. A file-backed interface takes a filename; an
    /// in-memory interface takes a shared-cache key instead.
    pub fn new(
        filename: Option<&Path>,
        shared_cache_key: Option<&str>,
        flags: DbInterfaceFlags,
    ) -> Result<DbInterface> {
        DbInterface::new_with_config(filename, shared_cache_key, flags, DbConfig::default())
    }

    pub fn new_with_config(
        filename: Option<&Path>,
        shared_cache_key: Option<&str>,
        flags: DbInterfaceFlags,
        config: DbConfig,
    ) -> Result<DbInterface> {
        if filename.is_none() && shared_cache_key.is_none() {
            return Err(StoreError::Open(
                "either a filename or a shared cache key is required".to_string(),
            ));
        }

        let mut open_flags = OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if flags.readonly {
            open_flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        } else {
            open_flags |= OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        }

        let target = if flags.in_memory {
            let key = shared_cache_key.ok_or_else(|| {
                StoreError::Open("in-memory interfaces need a shared cache key".to_string())
            })?;
            open_flags |= OpenFlags::SQLITE_OPEN_MEMORY
                | OpenFlags::SQLITE_OPEN_SHARED_CACHE
                | OpenFlags::SQLITE_OPEN_URI;
            format!("file:{}", key)
        } else {
            let path = filename.ok_or_else(|| {
                StoreError::Open("file-backed interfaces need a filename".to_string())
            })?;
            path.to_string_lossy().into_owned()
        };

        let conn = Connection::open_with_flags(&target, open_flags)
            .map_err(|e| StoreError::Open(format!("'{}': {}", target, e)))?;

        tracing::debug!("opened sqlite3 database '{}'", target);

        let iface = DbInterface {
            conn,
            filename: filename.map(|p| p.to_path_buf()),
            shared_cache_key: shared_cache_key.map(|k| k.to_string()),
            flags,
            select_mru: RefCell::new(StatementMru::new(config.select_cache_size)),
            update_mru: RefCell::new(StatementMru::new(config.update_cache_size)),
            cancellable: Arc::new(Mutex::new(None)),
            title_articles: Arc::new(Mutex::new(parse_title_articles(&config.title_articles))),
            entry_mutex: flags.use_mutex.then(|| Mutex::new(())),
            n_users: Cell::new(0),
            config,
        };

        iface.apply_pragmas()?;
        iface.reset_collator();
        iface.install_progress_handler();
        functions::register_all(&iface.conn)?;
        iface.sync_prepared_cache_capacity();

        Ok(iface)
    }

    fn apply_pragmas(&self) -> Result<()> {
        let config = &self.config;

        if !self.flags.readonly {
            self.conn
                .pragma_update(None, "page_size", config.page_size)?;
            // journal_mode returns the resulting mode as a row
            self.conn.query_row(
                &format!("PRAGMA journal_mode={}", config.journal_mode),
                [],
                |_| Ok(()),
            )?;
            self.conn
                .pragma_update(None, "synchronous", &config.synchronous)?;
        }

        self.conn
            .pragma_update(None, "cache_size", config.cache_size)?;
        self.conn.pragma_update(None, "temp_store", "MEMORY")?;
        self.conn
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

        Ok(())
    }

    fn install_progress_handler(&self) {
        let slot = Arc::clone(&self.cancellable);
        self.conn.progress_handler(
            PROGRESS_HANDLER_STEPS,
            Some(move || {
                slot.lock()
                    .map(|token| token.as_ref().map(|t| t.is_cancelled()).unwrap_or(false))
                    .unwrap_or(false)
            }),
        );
    }

    /// Re-register the Unicode and title collations. Overwrites any previous
    /// registration under the same names.
    pub fn reset_collator(&self) {
        tracing::debug!("resetting collator");

        if let Err(e) = self
            .conn
            .create_collation(COLLATION_NAME, |a, b| unicode_compare(a, b))
        {
            tracing::error!("could not set collation function: {}", e);
        }

        let articles = Arc::clone(&self.title_articles);
        let title = move |a: &str, b: &str| {
            let articles = articles.lock().map(|a| a.clone()).unwrap_or_default();
            title_compare(a, b, &articles)
        };

        if let Err(e) = self.conn.create_collation(TITLE_COLLATION_NAME, title) {
            tracing::error!("could not set title collation function: {}", e);
        }
    }

    /// Replace the '|'-separated title article list used by the title
    /// collation.
    pub fn set_title_articles(&self, articles: &str) {
        if let Ok(mut list) = self.title_articles.lock() {
            *list = parse_title_articles(articles);
        }
        self.reset_collator();
    }

    pub fn flags(&self) -> DbInterfaceFlags {
        self.flags
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn shared_cache_key(&self) -> Option<&str> {
        self.shared_cache_key.as_deref()
    }

    pub(crate) fn lock_entry(&self) -> Option<MutexGuard<'_, ()>> {
        self.entry_mutex
            .as_ref()
            .map(|mutex| mutex.lock().expect("entry mutex poisoned"))
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn set_cancellable(&self, token: Option<Cancellable>) {
        if let Ok(mut slot) = self.cancellable.lock() {
            *slot = token;
        }
    }

    pub(crate) fn clear_cancellable(&self) {
        self.set_cancellable(None);
    }

    pub(crate) fn ref_use(&self) {
        self.n_users.set(self.n_users.get() + 1);
    }

    pub(crate) fn unref_use(&self) {
        let count = self.n_users.get();
        debug_assert!(count > 0, "use count underflow");
        self.n_users.set(count.saturating_sub(1));
    }

    /// Whether cursors are currently open on this interface.
    pub fn is_used(&self) -> bool {
        self.n_users.get() > 0
    }

    /// ATTACH a database. Passing no file on an in-memory interface derives
    /// a shared-cache URI from the interface key and an MD5 of the name.
    pub fn attach_database(&self, file: Option<&Path>, name: &str) -> Result<()> {
        let _guard = self.lock_entry();

        let uri = if let Some(file) = file {
            file.to_string_lossy().into_owned()
        } else if let (Some(key), true) = (self.shared_cache_key.as_deref(), self.flags.in_memory)
        {
            let digest = hex::encode(Md5::digest(name.as_bytes()));
            format!("file:{}-{}?mode=memory&cache=shared", key, digest)
        } else {
            return Err(StoreError::Query(
                "attach needs a file or an in-memory shared cache key".to_string(),
            ));
        };

        self.conn
            .execute_batch(&format!("ATTACH DATABASE \"{}\" AS \"{}\"", uri, name))
            .map_err(StoreError::from)
    }

    pub fn detach_database(&self, name: &str) -> Result<()> {
        let _guard = self.lock_entry();

        self.conn
            .execute_batch(&format!("DETACH DATABASE \"{}\"", name))
            .map_err(StoreError::from)
    }

    /// Prepare a statement, consulting the MRU for cacheable kinds.
    ///
    /// A cache hit whose statement is already borrowed is substituted with a
    /// fresh uncached prepare, so callers never share a half-bound
    /// statement.
    pub fn create_statement(&self, kind: CacheKind, sql: &str) -> Result<DbStatement<'_>> {
        let _guard = self.lock_entry();

        let effective_kind = match kind {
            CacheKind::None => CacheKind::None,
            cached_kind => {
                let mru = self.mru_for(cached_kind);
                let mut mru = mru.borrow_mut();

                match mru.lookup(sql) {
                    Some(entry) if entry.borrowed => CacheKind::None,
                    Some(entry) => {
                        entry.borrowed = true;
                        cached_kind
                    }
                    None => {
                        mru.insert(sql.to_string(), StmtEntry { borrowed: true });
                        cached_kind
                    }
                }
            }
        };

        let inner = match effective_kind {
            CacheKind::None => StmtInner::Plain(self.conn.prepare(sql)?),
            _ => StmtInner::Cached(self.conn.prepare_cached(sql)?),
        };

        Ok(DbStatement::new(self, inner, sql.to_string(), effective_kind))
    }

    /// `create_statement` over preformatted SQL, the rendition of the
    /// printf-style variant.
    pub fn create_statement_fmt(
        &self,
        kind: CacheKind,
        sql: std::fmt::Arguments<'_>,
    ) -> Result<DbStatement<'_>> {
        self.create_statement(kind, &sql.to_string())
    }

    /// One-shot convenience execution of one or more statements.
    pub fn execute_sql(&self, sql: &str) -> Result<()> {
        let _guard = self.lock_entry();
        self.conn.execute_batch(sql).map_err(StoreError::from)
    }

    pub(crate) fn mru_for(&self, kind: CacheKind) -> &RefCell<StatementMru> {
        match kind {
            CacheKind::Update => &self.update_mru,
            _ => &self.select_mru,
        }
    }

    pub(crate) fn mark_statement_released(&self, kind: CacheKind, sql: &str) {
        if kind == CacheKind::None {
            return;
        }

        let mut mru = self.mru_for(kind).borrow_mut();
        if let Some(entry) = mru.peek(sql) {
            entry.borrowed = false;
        }
    }

    /// Set one MRU's capacity; the minimum enforced value is 3.
    pub fn set_max_stmt_cache_size(&self, kind: CacheKind, max: usize) {
        match kind {
            CacheKind::Select | CacheKind::Update => {
                self.mru_for(kind).borrow_mut().set_max(max);
                self.sync_prepared_cache_capacity();
            }
            CacheKind::None => {}
        }
    }

    fn sync_prepared_cache_capacity(&self) {
        let capacity = self.select_mru.borrow().max() + self.update_mru.borrow().max();
        self.conn.set_prepared_statement_cache_capacity(capacity);
    }

    /// Drop both statement caches and ask SQLite to release page cache
    /// memory.
    pub fn release_memory(&self) -> Result<()> {
        let _guard = self.lock_entry();

        self.select_mru.borrow_mut().clear();
        self.update_mru.borrow_mut().clear();
        self.conn.flush_prepared_statement_cache();
        self.conn.release_memory().map_err(StoreError::from)
    }

    /// PASSIVE or FULL WAL checkpoint.
    pub fn wal_checkpoint(&self, blocking: bool) -> Result<()> {
        let _guard = self.lock_entry();
        let mode = if blocking { "FULL" } else { "PASSIVE" };

        tracing::debug!("checkpointing database ({})", mode);

        self.conn
            .query_row(&format!("PRAGMA wal_checkpoint({})", mode), [], |_| Ok(()))
            .map_err(StoreError::from)
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    // FTS integration

    pub fn fts_init_db(&self) -> Result<()> {
        let _guard = self.lock_entry();
        fts::init_db(&self.conn)
    }

    pub fn fts_create_table(&self, database: &str, columns: &[FtsColumn]) -> Result<()> {
        let _guard = self.lock_entry();
        fts::create_table(&self.conn, database, columns)
    }

    pub fn fts_alter_table(&self, database: &str, columns: &[FtsColumn]) -> Result<()> {
        let _guard = self.lock_entry();
        fts::alter_table(&self.conn, database, columns)
    }

    pub fn fts_delete_table(&self, database: &str) -> Result<()> {
        let _guard = self.lock_entry();
        fts::delete_table(&self.conn, database)
    }

    pub fn fts_rebuild_tokens(&self, database: &str) -> Result<()> {
        let _guard = self.lock_entry();
        fts::rebuild_tokens(&self.conn, database)
    }

    /// Index the text of the given properties for one resource, pulling the
    /// current values from the fts_view projection.
    pub fn fts_update_text(&self, database: &str, rowid: i64, properties: &[&str]) -> Result<()> {
        let sql = fts::update_text_query(database, properties);
        let mut stmt = self.create_statement(CacheKind::Update, &sql)?;
        stmt.bind_int(0, rowid)?;
        stmt.execute(None)
            .map(|_| ())
            .map_err(|e| StoreError::Fts(format!("could not insert FTS text: {}", e)))
    }

    /// Write the FTS 'delete' tombstone for one resource.
    pub fn fts_delete_text(&self, database: &str, rowid: i64, properties: &[&str]) -> Result<()> {
        let sql = fts::delete_text_query(database, properties);
        let mut stmt = self.create_statement(CacheKind::Update, &sql)?;
        stmt.bind_int(0, rowid)?;
        stmt.execute(None)
            .map(|_| ())
            .map_err(|e| StoreError::Fts(format!("could not delete FTS text: {}", e)))
    }
}

impl Drop for DbInterface {
    fn drop(&mut self) {
        self.select_mru.borrow_mut().clear();
        self.update_mru.borrow_mut().clear();

        if self.is_used() {
            tracing::warn!("database interface dropped with open cursors");
        }
    }
}

/// Shared-cache contention from a writer on the same in-memory database.
pub(crate) fn is_locked_sharedcache(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(ffi_err, _)
            if ffi_err.extended_code == rusqlite::ffi::SQLITE_LOCKED_SHAREDCACHE
    )
}
