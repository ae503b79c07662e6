use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of newsdeck appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A value could not be encoded for storage
    #[error("Failed to encode stored value: {0}")]
    Encode(#[from] serde_json::Error),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Persisted Keys
// ============================================================================

/// Fixed storage keys for the persisted id lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdListKey {
    /// Items known to be read locally (the read overlay).
    ReadItems,
    /// Items whose read state has not been acknowledged by the server yet.
    ReadSyncQueue,
}

impl IdListKey {
    pub fn as_str(self) -> &'static str {
        match self {
            IdListKey::ReadItems => "read_state.read_items",
            IdListKey::ReadSyncQueue => "read_state.sync_queue",
        }
    }
}
