//! Local read/star overlay and the offline read-sync queue.
//!
//! Read state is local-first: marking an item read takes effect immediately
//! in the overlay and is persisted, whether or not the remote service is
//! reachable. When a remote is configured the id also enters the sync queue,
//! which is drained with at most one in-flight call per item. An id leaves
//! the queue only after the remote acknowledges it.
//!
//! # Architecture
//!
//! - [`BoundedIdSet`] - insertion-ordered id set with a fixed cap
//! - [`InFlight`] - per-id single-flight tokens for read and star calls
//! - [`ReadTracker`] - the overlay, the queue, and their persistence

mod id_set;
mod in_flight;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

pub use id_set::{BoundedIdSet, MAX_TRACKED_IDS};
pub use in_flight::{InFlight, InFlightToken};

use crate::feed::FeedItem;
use crate::remote::NewsClient;
use crate::storage::{Database, IdListKey};

/// Upper bound on concurrent read-sync calls during a queue sweep.
pub const SYNC_CONCURRENCY: usize = 8;

/// Result of a single read-sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSync {
    /// The remote acknowledged the read; the id left the queue.
    Synced,
    /// Another call for the same id was already running; nothing was sent.
    AlreadyInFlight,
    /// The call failed; the id stays queued for a later sweep.
    Failed,
}

/// Tally of one queue sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub synced: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Result of a star toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarOutcome {
    /// The remote accepted the new state.
    Applied,
    /// The remote call failed and the local flag was restored.
    Reverted,
    /// A toggle for this item was already running; ignored.
    AlreadyInFlight,
    /// No remote endpoint is configured.
    Unavailable,
}

/// Owns the read overlay, the sync queue and both in-flight sets.
///
/// All methods take `&self` so concurrent sync calls for different ids can
/// run side by side. The id-set locks are never held across an `.await`;
/// only `writer` is, so persisted snapshots land in the order they were taken.
pub struct ReadTracker {
    read_items: Mutex<BoundedIdSet>,
    sync_queue: Mutex<BoundedIdSet>,
    pending_reads: InFlight,
    pending_stars: InFlight,
    store: Option<Database>,
    writer: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ReadTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadTracker")
            .field("read_items", &self.read_items.lock().len())
            .field("sync_queue", &*self.sync_queue.lock())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl Default for ReadTracker {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ReadTracker {
    /// A tracker that keeps everything in memory and persists nothing.
    pub fn in_memory() -> Self {
        Self {
            read_items: Mutex::new(BoundedIdSet::default()),
            sync_queue: Mutex::new(BoundedIdSet::default()),
            pending_reads: InFlight::new(),
            pending_stars: InFlight::new(),
            store: None,
            writer: tokio::sync::Mutex::new(()),
        }
    }

    /// Restore the overlay and queue from `db`. Malformed or missing lists
    /// start empty.
    pub async fn load(db: Database) -> Self {
        let read_ids = db.load_id_list(IdListKey::ReadItems).await;
        let queued_ids = db.load_id_list(IdListKey::ReadSyncQueue).await;
        tracing::info!(
            read = read_ids.len(),
            queued = queued_ids.len(),
            "Restored local read state"
        );

        Self {
            read_items: Mutex::new(BoundedIdSet::with_ids(MAX_TRACKED_IDS, read_ids)),
            sync_queue: Mutex::new(BoundedIdSet::with_ids(MAX_TRACKED_IDS, queued_ids)),
            pending_reads: InFlight::new(),
            pending_stars: InFlight::new(),
            store: Some(db),
            writer: tokio::sync::Mutex::new(()),
        }
    }

    // ========================================================================
    // Overlay
    // ========================================================================

    pub fn is_read_locally(&self, item_id: i64) -> bool {
        self.read_items.lock().contains(item_id)
    }

    /// Overlay-first unread check: local knowledge beats the remote flag.
    pub fn is_unread(&self, item: &FeedItem) -> bool {
        !self.is_read_locally(item.id) && item.unread
    }

    /// Force `unread = false` on every item the overlay knows is read.
    pub fn apply_overrides(&self, items: &mut [FeedItem]) {
        let read_items = self.read_items.lock();
        for item in items.iter_mut().filter(|i| read_items.contains(i.id)) {
            item.unread = false;
        }
    }

    /// Add `item_id` to the overlay and persist it.
    pub async fn record_read(&self, item_id: i64) {
        if let Some(evicted) = self.read_items.lock().insert(item_id) {
            tracing::debug!(evicted, "Read overlay full, dropped oldest id");
        }
        self.persist(IdListKey::ReadItems).await;
    }

    pub fn read_ids(&self) -> Vec<i64> {
        self.read_items.lock().to_vec()
    }

    // ========================================================================
    // Sync Queue
    // ========================================================================

    /// Queue `item_id` for remote read sync and persist the queue.
    pub async fn enqueue_sync(&self, item_id: i64) {
        if let Some(evicted) = self.sync_queue.lock().insert(item_id) {
            tracing::warn!(evicted, "Sync queue full, dropped oldest pending read");
        }
        self.persist(IdListKey::ReadSyncQueue).await;
    }

    pub fn queued_ids(&self) -> Vec<i64> {
        self.sync_queue.lock().to_vec()
    }

    pub fn is_queued(&self, item_id: i64) -> bool {
        self.sync_queue.lock().contains(item_id)
    }

    /// Full local + remote read effect.
    ///
    /// The overlay is always updated. With a client the id is also queued and
    /// a sync attempted; without one no network call is made and `None` is
    /// returned.
    pub async fn mark_read(&self, client: Option<&NewsClient>, item_id: i64) -> Option<ReadSync> {
        self.record_read(item_id).await;
        let client = client?;
        self.enqueue_sync(item_id).await;
        Some(self.sync_read(client, item_id).await)
    }

    /// Send one read mark to the remote, unless one is already in flight.
    pub async fn sync_read(&self, client: &NewsClient, item_id: i64) -> ReadSync {
        let Some(_token) = self.pending_reads.try_claim(item_id) else {
            tracing::debug!(item_id, "Read sync already in flight, skipping");
            return ReadSync::AlreadyInFlight;
        };

        match client.mark_read(item_id).await {
            Ok(()) => {
                self.sync_queue.lock().remove(item_id);
                self.persist(IdListKey::ReadSyncQueue).await;
                tracing::debug!(item_id, "Read state synced");
                ReadSync::Synced
            }
            Err(e) => {
                tracing::warn!(item_id, error = %e, "Read sync failed, will retry");
                ReadSync::Failed
            }
        }
    }

    /// Attempt every queued id, at most [`SYNC_CONCURRENCY`] at a time.
    pub async fn process_queue(&self, client: &NewsClient) -> QueueReport {
        let ids = self.queued_ids();
        if ids.is_empty() {
            return QueueReport::default();
        }

        let report = stream::iter(ids)
            .map(|id| self.sync_read(client, id))
            .buffer_unordered(SYNC_CONCURRENCY)
            .fold(QueueReport::default(), |mut report, result| async move {
                match result {
                    ReadSync::Synced => report.synced += 1,
                    ReadSync::Failed => report.failed += 1,
                    ReadSync::AlreadyInFlight => report.skipped += 1,
                }
                report
            })
            .await;

        tracing::info!(
            synced = report.synced,
            failed = report.failed,
            skipped = report.skipped,
            "Processed read sync queue"
        );
        report
    }

    pub fn is_read_in_flight(&self, item_id: i64) -> bool {
        self.pending_reads.contains(item_id)
    }

    // ========================================================================
    // Star Toggles
    // ========================================================================

    /// Claim the star-toggle slot for `item_id`. Returns `None` while another
    /// toggle for the same item is running.
    pub fn claim_star(&self, item_id: i64) -> Option<InFlightToken<'_>> {
        self.pending_stars.try_claim(item_id)
    }

    pub fn is_star_in_flight(&self, item_id: i64) -> bool {
        self.pending_stars.contains(item_id)
    }

    /// Write the current contents of `key`'s list.
    ///
    /// The snapshot is taken after `writer` is acquired, so a later write
    /// never carries older state than an earlier one.
    async fn persist(&self, key: IdListKey) {
        let Some(store) = &self.store else {
            return;
        };
        let _writer = self.writer.lock().await;
        let snapshot = self.snapshot(key);
        if let Err(e) = store.save_id_list(key, &snapshot).await {
            tracing::warn!(key = key.as_str(), error = %e, "Failed to persist read state");
        }
    }

    fn snapshot(&self, key: IdListKey) -> Vec<i64> {
        match key {
            IdListKey::ReadItems => self.read_items.lock().to_vec(),
            IdListKey::ReadSyncQueue => self.sync_queue.lock().to_vec(),
        }
    }
}
