use super::types::{FeedItem, ViewMode};
use crate::read_state::ReadTracker;

/// Items the list should show, in fetch order.
///
/// Starred-only keeps starred items; the `all` view returns everything else
/// as fetched; the unread view filters through the read overlay.
pub fn visible_items<'a>(
    items: &'a [FeedItem],
    view_mode: ViewMode,
    starred_only: bool,
    tracker: &ReadTracker,
) -> Vec<&'a FeedItem> {
    items
        .iter()
        .filter(|item| !starred_only || item.starred)
        .filter(|item| view_mode.includes_read() || tracker.is_unread(item))
        .collect()
}
