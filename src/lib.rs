//! newsdeck: a personal news deck over a Nextcloud News feed.
//!
//! Items are paged in from the remote feed reader, overlaid with local read
//! state that syncs back through an offline queue, and turned into cards by
//! inspecting each body for embeddable media.

pub mod card;
pub mod config;
pub mod feed;
pub mod media;
pub mod read_state;
pub mod remote;
pub mod session;
pub mod storage;
pub mod util;
