/**
 * mru.rs
 * Most-recently-used statement cache policy
 *
 * Each interface holds two of these, one for SELECT and one for UPDATE
 * statements, keyed by SQL text. The ring is ordered head=LRU, tail=MRU; a
 * lookup hit promotes the entry to most recently used, an insert at capacity
 * evicts the least recently used entry. Entries carry a borrowed flag so a
 * statement already handed out is substituted with a fresh uncached prepare.
 */

use std::num::NonZeroUsize;

use lru::LruCache;

/// Minimum enforced capacity: a meaningful ring needs a head and a tail.
pub const MIN_CACHE_SIZE: usize = 3;

/// Default capacity, matching the interface's initial configuration.
pub const DEFAULT_CACHE_SIZE: usize = 100;

#[derive(Debug, Default)]
pub struct StmtEntry {
    pub borrowed: bool,
}

#[derive(Debug)]
pub struct StatementMru {
    cache: LruCache<String, StmtEntry>,
}

impl StatementMru {
    pub fn new(max: usize) -> StatementMru {
        let max = max.max(MIN_CACHE_SIZE);
        StatementMru {
            cache: LruCache::new(NonZeroUsize::new(max).expect("capacity is nonzero")),
        }
    }

    pub fn max(&self) -> usize {
        self.cache.cap().get()
    }

    /// Change the capacity; values below the minimum are clamped. Shrinking
    /// evicts LRU entries immediately.
    pub fn set_max(&mut self, max: usize) {
        let max = max.max(MIN_CACHE_SIZE);
        self.cache
            .resize(NonZeroUsize::new(max).expect("capacity is nonzero"));
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Look up by SQL text; a hit becomes the most recently used entry.
    pub fn lookup(&mut self, sql: &str) -> Option<&mut StmtEntry> {
        self.cache.get_mut(sql)
    }

    /// Look up without touching recency (used when releasing a borrow).
    pub fn peek(&mut self, sql: &str) -> Option<&mut StmtEntry> {
        self.cache.peek_mut(sql)
    }

    pub fn contains(&self, sql: &str) -> bool {
        self.cache.contains(sql)
    }

    /// Insert a fresh entry as most recently used, evicting the LRU entry at
    /// capacity. Returns the evicted SQL text, if any.
    pub fn insert(&mut self, sql: String, entry: StmtEntry) -> Option<String> {
        self.cache.push(sql, entry).map(|(evicted, _)| evicted)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// SQL texts ordered most recently used first.
    pub fn keys_mru_first(&self) -> Vec<String> {
        self.cache.iter().map(|(sql, _)| sql.clone()).collect()
    }
}

impl Default for StatementMru {
    fn default() -> Self {
        StatementMru::new(DEFAULT_CACHE_SIZE)
    }
}
