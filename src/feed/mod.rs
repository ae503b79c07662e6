//! Feed items and the state machine that pages them in.
//!
//! - [`types`] - remote records (`FeedItem`, `Folder`, `Feed`) and the view
//!   selection enums
//! - [`pagination`] - the cursor and replace-vs-append merge rules
//! - [`view`] - projection of the collection onto what the list shows

mod pagination;
mod types;
mod view;

pub use pagination::{Cursor, FeedState, FetchOptions, PageOutcome, PageRequest, PageSizes};
pub use types::{Feed, FeedItem, Folder, FolderSelector, Lookups, ViewMode};
pub use view::visible_items;
