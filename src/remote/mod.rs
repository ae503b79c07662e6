//! Clients for the services the deck talks to.
//!
//! - [`NewsClient`] - the Nextcloud News feed-reader API (folders, feeds,
//!   items, read and star mutations)
//! - [`PostLookup`] - the public Bluesky API, used to hydrate rich post
//!   embeds, with a process-lifetime memo table
//!
//! Every call is fallible and returns [`RemoteError`]; callers in
//! [`crate::session`] turn failures into degraded state instead of
//! propagating them.

mod bluesky;
mod http;
mod news;

use thiserror::Error;

pub use bluesky::{
    Author, EmbedView, ExternalView, ImageView, PostLookup, PostView, RecordTarget, RecordValue,
    DEFAULT_RICH_EMBED_API_URL,
};
pub use http::build_http_client;
pub use news::{ItemQuery, NewsClient};

/// Errors from any remote call.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Body was not the JSON shape we expected
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The configured server URL cannot be used
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}
