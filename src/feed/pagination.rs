use super::types::{FeedItem, FolderSelector, ViewMode};
use crate::remote::ItemQuery;

/// Incremental pagination bookkeeping for the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Items already fetched in a read-inclusive view.
    pub offset: usize,
    pub has_more: bool,
    /// Set while a page request is outstanding.
    pub loading: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            offset: 0,
            has_more: true,
            loading: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub append: bool,
    pub offset_override: Option<usize>,
}

impl FetchOptions {
    pub fn replace() -> Self {
        Self::default()
    }

    pub fn append() -> Self {
        Self {
            append: true,
            offset_override: None,
        }
    }

    pub fn at_offset(offset: usize) -> Self {
        Self {
            append: false,
            offset_override: Some(offset),
        }
    }
}

/// Page sizes used when building requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizes {
    /// Batch size for the unread-only view, which never paginates.
    pub initial_batch: usize,
    /// Batch size for each page of the read-inclusive view.
    pub per_page: usize,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            initial_batch: 50,
            per_page: 50,
        }
    }
}

/// A request issued by [`FeedState::begin_fetch`], to be settled with
/// [`FeedState::apply_page`] or [`FeedState::fail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub query: ItemQuery,
    /// Whether the page extends the collection rather than replacing it.
    pub append: bool,
    /// Selection generation the request was issued under.
    pub generation: u64,
}

/// What a page fetch did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Replaced { count: usize },
    Appended { count: usize },
    /// An append returned nothing; `has_more` is now false.
    Exhausted,
    /// A fetch was already running; this one was dropped.
    Busy,
    /// Transport failure; the collection was cleared.
    Failed,
    /// No remote endpoint is configured; the collection was cleared.
    Unconfigured,
    /// The selection changed while the request was out; the page was dropped.
    Superseded,
}

/// The item collection plus the selection and cursor that produced it.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    items: Vec<FeedItem>,
    cursor: Cursor,
    selector: FolderSelector,
    view_mode: ViewMode,
    sizes: PageSizes,
    error: bool,
    generation: u64,
}

impl FeedState {
    pub fn new(sizes: PageSizes) -> Self {
        Self {
            sizes,
            ..Self::default()
        }
    }

    pub fn items(&self) -> &[FeedItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [FeedItem] {
        &mut self.items
    }

    pub fn item_mut(&mut self, id: i64) -> Option<&mut FeedItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Remove an item from the collection. Returns whether it was present.
    pub fn remove_item(&mut self, id: i64) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn selector(&self) -> FolderSelector {
        self.selector
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn sizes(&self) -> PageSizes {
        self.sizes
    }

    /// True after a failed fetch until the next successful one.
    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn is_loading(&self) -> bool {
        self.cursor.loading
    }

    // ========================================================================
    // Selection
    // ========================================================================

    pub fn reset_cursor(&mut self) {
        self.cursor.offset = 0;
        self.cursor.has_more = true;
    }

    /// A new selection invalidates any request still in flight.
    fn change_selection(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.cursor.loading = false;
        self.reset_cursor();
    }

    /// Show one folder, or everything for `None`. Leaves starred mode.
    pub fn select_folder(&mut self, folder_id: Option<i64>) {
        self.selector = match folder_id {
            Some(id) => FolderSelector::Folder(id),
            None => FolderSelector::All,
        };
        self.change_selection();
    }

    /// Switch to starred-only. Starred view always includes read items.
    ///
    /// Returns `false` (and changes nothing) when already in starred mode.
    pub fn select_starred(&mut self) -> bool {
        if self.selector.is_starred() {
            return false;
        }
        self.selector = FolderSelector::Starred;
        self.view_mode = ViewMode::All;
        self.change_selection();
        true
    }

    /// Returns `false` when `mode` is already active.
    pub fn set_view_mode(&mut self, mode: ViewMode) -> bool {
        if self.view_mode == mode {
            return false;
        }
        self.view_mode = mode;
        self.change_selection();
        true
    }

    // ========================================================================
    // Fetch Lifecycle
    // ========================================================================

    /// Start a page fetch, or return `None` if one is already in flight.
    ///
    /// The unread-only view always replaces from offset 0 with the initial
    /// batch size, whatever `options` asked for; an explicit offset override
    /// still wins.
    pub fn begin_fetch(&mut self, options: FetchOptions) -> Option<PageRequest> {
        if self.cursor.loading {
            tracing::debug!("Fetch already in flight, dropping request");
            return None;
        }
        self.cursor.loading = true;

        let include_read = self.view_mode.includes_read();
        let batch_size = if include_read {
            self.sizes.per_page
        } else {
            self.sizes.initial_batch
        };
        let offset = options
            .offset_override
            .unwrap_or(if include_read { self.cursor.offset } else { 0 });

        Some(PageRequest {
            query: ItemQuery {
                selector: self.selector,
                include_read,
                batch_size,
                offset,
            },
            append: options.append && include_read,
            generation: self.generation,
        })
    }

    /// Merge a successfully fetched page.
    pub fn apply_page(&mut self, request: &PageRequest, page: Vec<FeedItem>) -> PageOutcome {
        if self.is_stale(request) {
            tracing::debug!(generation = request.generation, "Dropping page for old selection");
            return PageOutcome::Superseded;
        }
        self.cursor.loading = false;
        self.error = false;

        let include_read = request.query.include_read;
        let batch_size = request.query.batch_size;
        let count = page.len();

        if request.append {
            if page.is_empty() {
                self.cursor.has_more = false;
                return PageOutcome::Exhausted;
            }
            self.items.extend(page);
            self.cursor.offset += count;
            self.cursor.has_more = count == batch_size;
            PageOutcome::Appended { count }
        } else {
            self.items = page;
            self.cursor.offset = if include_read { count } else { 0 };
            self.cursor.has_more = include_read && count == batch_size;
            PageOutcome::Replaced { count }
        }
    }

    /// Settle a failed fetch: clear the collection and flag the error.
    pub fn fail(&mut self, request: &PageRequest) -> PageOutcome {
        if self.is_stale(request) {
            return PageOutcome::Superseded;
        }
        self.cursor.loading = false;
        self.items.clear();
        self.error = true;
        PageOutcome::Failed
    }

    fn is_stale(&self, request: &PageRequest) -> bool {
        request.generation != self.generation
    }

    /// Without a remote there is nothing to show.
    pub fn clear_unconfigured(&mut self) -> PageOutcome {
        self.items.clear();
        PageOutcome::Unconfigured
    }
}
