//! The application state object.
//!
//! A [`Session`] owns the item collection, the read overlay and the remote
//! clients, and exposes every user-level operation: paging, selection
//! changes, mark-read, star toggles and rich-post hydration. There is no
//! global state; tests build as many sessions as they like.
//!
//! Every operation takes `&self`. State sits behind short-lived locks that
//! are released before any network call, so the collection (including an
//! optimistic star flag) stays readable while requests are outstanding.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;

use crate::card::{build_card, CardOptions, FeedCard};
use crate::feed::{
    visible_items, FeedItem, FeedState, FetchOptions, Lookups, PageOutcome, PageSizes, ViewMode,
};
use crate::media::{project_post, RichPart};
use crate::read_state::{QueueReport, ReadSync, ReadTracker, StarOutcome};
use crate::remote::{NewsClient, PostLookup};

#[derive(Debug)]
pub struct Session {
    feed: Mutex<FeedState>,
    tracker: Arc<ReadTracker>,
    lookups: RwLock<Lookups>,
    client: Option<NewsClient>,
    posts: Option<tokio::sync::Mutex<PostLookup>>,
    rich_embeds: Mutex<HashMap<String, Vec<RichPart>>>,
    card_options: CardOptions,
    queue_drain: Mutex<Option<JoinHandle<QueueReport>>>,
}

impl Session {
    pub fn new(sizes: PageSizes, tracker: ReadTracker) -> Self {
        Self {
            feed: Mutex::new(FeedState::new(sizes)),
            tracker: Arc::new(tracker),
            lookups: RwLock::new(Lookups::default()),
            client: None,
            posts: None,
            rich_embeds: Mutex::new(HashMap::new()),
            card_options: CardOptions::default(),
            queue_drain: Mutex::new(None),
        }
    }

    pub fn with_client(mut self, client: NewsClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_post_lookup(mut self, posts: PostLookup) -> Self {
        self.posts = Some(tokio::sync::Mutex::new(posts));
        self
    }

    pub fn with_card_options(mut self, options: CardOptions) -> Self {
        self.card_options = options;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Lock the collection for reading. Do not hold the guard across an
    /// `.await` or while calling back into the session.
    pub fn feed(&self) -> MutexGuard<'_, FeedState> {
        self.feed.lock()
    }

    pub fn tracker(&self) -> &ReadTracker {
        &self.tracker
    }

    pub fn lookups(&self) -> RwLockReadGuard<'_, Lookups> {
        self.lookups.read()
    }

    /// Load the folder and feed tables. A failure leaves that table empty.
    pub async fn load_lookups(&self) {
        let Some(client) = &self.client else {
            return;
        };

        let (folders, feeds) = futures::join!(client.folders(), client.feeds());
        let mut lookups = self.lookups.write();
        lookups.folders = folders.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load folders");
            Vec::new()
        });
        lookups.feeds = feeds.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load feeds");
            Vec::new()
        });
        tracing::info!(
            folders = lookups.folders.len(),
            feeds = lookups.feeds.len(),
            "Loaded lookup tables"
        );
    }

    // ========================================================================
    // Paging
    // ========================================================================

    /// Fetch a page for the current selection and merge it.
    ///
    /// A successful fetch re-applies the local read overlay and starts a
    /// background drain of the sync queue; the page is returned without
    /// waiting for it. See [`Session::settle_queue`].
    pub async fn fetch_page(&self, options: FetchOptions) -> PageOutcome {
        let Some(client) = &self.client else {
            return self.feed.lock().clear_unconfigured();
        };
        let Some(request) = self.feed.lock().begin_fetch(options) else {
            return PageOutcome::Busy;
        };

        let result = client.items(&request.query).await;

        let (outcome, fetched) = {
            let mut feed = self.feed.lock();
            match result {
                Ok(page) => {
                    let outcome = feed.apply_page(&request, page);
                    self.tracker.apply_overrides(feed.items_mut());
                    tracing::info!(
                        ?outcome,
                        offset = feed.cursor().offset,
                        has_more = feed.cursor().has_more,
                        "Merged page"
                    );
                    (outcome, true)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch items");
                    (feed.fail(&request), false)
                }
            }
        };

        if fetched {
            self.spawn_queue_drain();
        }
        outcome
    }

    /// Re-fetch the unread view from the top. Only acts in the unread view
    /// while no fetch is running.
    pub async fn refresh_unread(&self) -> Option<PageOutcome> {
        {
            let mut feed = self.feed.lock();
            if feed.view_mode() != ViewMode::Unread || feed.is_loading() {
                return None;
            }
            feed.reset_cursor();
        }
        Some(self.fetch_page(FetchOptions::at_offset(0)).await)
    }

    /// Append the next page. Only acts in the read-inclusive view when more
    /// pages exist.
    pub async fn load_more(&self) -> Option<PageOutcome> {
        {
            let feed = self.feed.lock();
            let cursor = feed.cursor();
            if feed.view_mode() != ViewMode::All || cursor.loading || !cursor.has_more {
                return None;
            }
        }
        Some(self.fetch_page(FetchOptions::append()).await)
    }

    pub async fn select_folder(&self, folder_id: Option<i64>) -> PageOutcome {
        self.feed.lock().select_folder(folder_id);
        self.fetch_page(FetchOptions::replace()).await
    }

    /// Switch to starred-only; `None` if already there.
    pub async fn select_starred(&self) -> Option<PageOutcome> {
        if !self.feed.lock().select_starred() {
            return None;
        }
        Some(self.fetch_page(FetchOptions::replace()).await)
    }

    /// Switch view mode; `None` if `mode` is already active.
    pub async fn set_view_mode(&self, mode: ViewMode) -> Option<PageOutcome> {
        if !self.feed.lock().set_view_mode(mode) {
            return None;
        }
        Some(self.fetch_page(FetchOptions::replace()).await)
    }

    /// Change folder and view mode together without fetching, so the
    /// caller can load the combined selection with a single request.
    pub fn set_selection(&self, folder_id: Option<i64>, mode: ViewMode) {
        let mut feed = self.feed.lock();
        feed.select_folder(folder_id);
        feed.set_view_mode(mode);
    }

    // ========================================================================
    // Read / Star
    // ========================================================================

    /// Mark an item read locally and, with a remote, queue and sync it.
    pub async fn mark_read(&self, item_id: i64) -> Option<ReadSync> {
        if let Some(item) = self.feed.lock().item_mut(item_id) {
            item.unread = false;
        }
        self.tracker.mark_read(self.client.as_ref(), item_id).await
    }

    /// Drain the sync queue now. Without a remote this does nothing.
    pub async fn process_queue(&self) -> QueueReport {
        match &self.client {
            Some(client) => self.tracker.process_queue(client).await,
            None => QueueReport::default(),
        }
    }

    /// Wait for the background queue drain started by the last fetch.
    ///
    /// `None` when no drain was started or it did not run to completion.
    pub async fn settle_queue(&self) -> Option<QueueReport> {
        let handle = self.queue_drain.lock().take()?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::warn!(error = %e, "Read sync drain did not finish");
                None
            }
        }
    }

    fn spawn_queue_drain(&self) {
        let Some(client) = self.client.clone() else {
            return;
        };
        let mut slot = self.queue_drain.lock();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("Read sync drain already running");
            return;
        }
        if self.tracker.queued_ids().is_empty() {
            return;
        }

        let tracker = Arc::clone(&self.tracker);
        *slot = Some(tokio::spawn(async move {
            tracker.process_queue(&client).await
        }));
    }

    /// Optimistically set an item's starred flag and push it to the remote.
    ///
    /// The new flag is visible through [`Session::feed`] while the request
    /// runs. On failure it goes back to what it was before the toggle. An
    /// item unstarred while the starred view is showing leaves the
    /// collection.
    pub async fn toggle_star(&self, item_id: i64, starred: bool) -> StarOutcome {
        let Some(client) = &self.client else {
            return StarOutcome::Unavailable;
        };
        let Some(_token) = self.tracker.claim_star(item_id) else {
            tracing::debug!(item_id, "Star toggle already in flight, ignoring");
            return StarOutcome::AlreadyInFlight;
        };

        let previous = self
            .feed
            .lock()
            .item_mut(item_id)
            .map(|item| std::mem::replace(&mut item.starred, starred));

        match client.set_starred(item_id, starred).await {
            Ok(()) => {
                let mut feed = self.feed.lock();
                if !starred && feed.selector().is_starred() {
                    feed.remove_item(item_id);
                }
                tracing::debug!(item_id, starred, "Star state synced");
                StarOutcome::Applied
            }
            Err(e) => {
                tracing::warn!(item_id, error = %e, "Star toggle failed, reverting");
                let mut feed = self.feed.lock();
                if let (Some(previous), Some(item)) = (previous, feed.item_mut(item_id)) {
                    item.starred = previous;
                }
                StarOutcome::Reverted
            }
        }
    }

    // ========================================================================
    // Presentation
    // ========================================================================

    /// Items the current view shows, in display order.
    pub fn visible_items(&self) -> Vec<FeedItem> {
        let feed = self.feed.lock();
        let items = visible_items(
            feed.items(),
            feed.view_mode(),
            feed.selector().is_starred(),
            &self.tracker,
        )
        .into_iter()
        .cloned()
        .collect();
        items
    }

    /// Cards for the visible items, in display order.
    pub fn cards(&self) -> Vec<FeedCard> {
        let feed = self.feed.lock();
        let lookups = self.lookups.read();
        let cards = visible_items(
            feed.items(),
            feed.view_mode(),
            feed.selector().is_starred(),
            &self.tracker,
        )
        .into_iter()
        .map(|item| {
            let unread = self.tracker.is_unread(item);
            build_card(item, &lookups, unread, self.card_options)
        })
        .collect();
        cards
    }

    /// Resolve rich-post records for the visible cards that carry one.
    ///
    /// Returns how many of those posts now have embed parts.
    pub async fn hydrate_rich_embeds(&self) -> usize {
        let Some(posts) = &self.posts else {
            return 0;
        };
        let uris: Vec<String> = self
            .cards()
            .into_iter()
            .filter_map(|card| card.rich_post_uri)
            .collect();
        if uris.is_empty() {
            return 0;
        }

        let resolved = posts.lock().await.resolve(&uris).await;
        let mut rich_embeds = self.rich_embeds.lock();
        for (uri, post) in resolved {
            let parts = post.map(|post| project_post(&post)).unwrap_or_default();
            rich_embeds.insert(uri, parts);
        }
        let hydrated = uris
            .iter()
            .filter(|uri| rich_embeds.get(uri.as_str()).is_some_and(|parts| !parts.is_empty()))
            .count();
        hydrated
    }

    /// Hydrated embed parts for a post, once resolved.
    pub fn rich_embed(&self, uri: &str) -> Option<Vec<RichPart>> {
        self.rich_embeds.lock().get(uri).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn offline() -> Session {
        Session::new(PageSizes::default(), ReadTracker::in_memory())
    }

    #[tokio::test]
    async fn test_unconfigured_fetch_clears() {
        let session = offline();
        assert!(!session.is_configured());
        assert_eq!(
            session.fetch_page(FetchOptions::replace()).await,
            PageOutcome::Unconfigured
        );
        assert!(session.feed().items().is_empty());
        assert!(!session.feed().is_loading());
    }

    #[tokio::test]
    async fn test_offline_mark_read_updates_overlay() {
        let session = offline();
        assert_eq!(session.mark_read(42).await, None);
        assert!(session.tracker().is_read_locally(42));
        assert!(session.tracker().queued_ids().is_empty());
    }

    #[tokio::test]
    async fn test_offline_star_is_unavailable() {
        let session = offline();
        assert_eq!(session.toggle_star(9, true).await, StarOutcome::Unavailable);
        assert_eq!(session.process_queue().await, QueueReport::default());
    }

    #[tokio::test]
    async fn test_view_mode_and_navigation_guards() {
        let session = offline();
        assert_eq!(session.set_view_mode(ViewMode::Unread).await, None);
        assert_eq!(session.load_more().await, None);
        assert_eq!(
            session.refresh_unread().await,
            Some(PageOutcome::Unconfigured)
        );

        assert_eq!(
            session.select_starred().await,
            Some(PageOutcome::Unconfigured)
        );
        assert_eq!(session.feed().view_mode(), ViewMode::All);
        assert_eq!(session.select_starred().await, None);
        assert_eq!(session.refresh_unread().await, None);
    }

    #[tokio::test]
    async fn test_hydrate_without_lookup_is_noop() {
        let session = offline();
        assert_eq!(session.hydrate_rich_embeds().await, 0);
        assert_eq!(session.rich_embed("at://x"), None);
    }
}
