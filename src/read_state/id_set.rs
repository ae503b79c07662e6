use lru::LruCache;
use std::num::NonZeroUsize;

/// Maximum number of ids kept in the read overlay and the sync queue.
pub const MAX_TRACKED_IDS: usize = 1000;

/// A set of item ids capped at a fixed size, evicting the oldest insertion.
///
/// Entries are never promoted after insertion, so the LRU order of the
/// backing cache is exactly insertion order.
pub struct BoundedIdSet {
    entries: LruCache<i64, ()>,
}

impl BoundedIdSet {
    pub fn new(cap: usize) -> Self {
        let cap = NonZeroUsize::new(cap).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(cap),
        }
    }

    /// Build a set from ids listed oldest first, trimming to `cap`.
    pub fn with_ids(cap: usize, ids: impl IntoIterator<Item = i64>) -> Self {
        let mut set = Self::new(cap);
        for id in ids {
            set.insert(id);
        }
        set
    }

    /// Insert an id. Re-inserting a present id is a no-op and keeps its age.
    ///
    /// Returns the evicted id when the insert pushed the set over its cap.
    pub fn insert(&mut self, id: i64) -> Option<i64> {
        if self.entries.contains(&id) {
            return None;
        }
        self.entries.push(id, ()).map(|(evicted, ())| evicted)
    }

    pub fn remove(&mut self, id: i64) -> bool {
        self.entries.pop(&id).is_some()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.entries.cap().get()
    }

    /// Ids ordered oldest first, the order they are persisted in.
    pub fn to_vec(&self) -> Vec<i64> {
        self.entries.iter().rev().map(|(id, ())| *id).collect()
    }
}

impl Default for BoundedIdSet {
    fn default() -> Self {
        Self::new(MAX_TRACKED_IDS)
    }
}

impl std::fmt::Debug for BoundedIdSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.to_vec()).finish()
    }
}
