//! Small helpers shared across the crate.
//!
//! - **Text**: terminal-safe output (control-character stripping, width-aware
//!   truncation) and excerpt building
//! - **URLs**: server URL validation and hostname extraction

mod text;
mod url;

pub use text::{collapse_whitespace, display_width, excerpt, strip_control_chars, truncate_to_width};
pub use url::{display_hostname, hostname, validate_server_url, UrlValidationError};
