//! Durable local storage.
//!
//! A single SQLite key/value table. The read overlay and the sync queue are
//! each stored under a fixed key as a JSON array of item ids, oldest first.

mod id_lists;
mod kv;
mod schema;
mod types;

pub use schema::Database;
pub use types::{DatabaseError, IdListKey};
