use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use super::types::DatabaseError;

/// SQLite-backed local state: one key/value table holding the persisted id
/// lists.
///
/// Cloning is cheap: all clones share the same connection pool.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("connections", &self.pool.size())
            .finish()
    }
}

impl Database {
    /// Open (creating if needed) the state database at `path` and make sure
    /// the table exists. `":memory:"` gives a private throwaway database.
    ///
    /// # Errors
    ///
    /// `DatabaseError::InstanceLocked` when another newsdeck process holds the
    /// file; `DatabaseError::Migration` when the table cannot be created.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let in_memory = path == ":memory:";
        if !in_memory {
            restrict_permissions(Path::new(path));
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}?mode=rwc"))
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        // Each ":memory:" connection would see its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 2 })
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let db = Self { pool };
        db.migrate().await?;
        tracing::debug!(path, "Opened state database");
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS local_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from_sqlx(e) {
            DatabaseError::Other(e) => DatabaseError::Migration(e.to_string()),
            locked => locked,
        })?;
        Ok(())
    }
}

/// State files are user-only. Create the file 0600 up front so there is no
/// window where it exists with umask permissions.
#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    if path.exists() {
        if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to set database file permissions");
        }
    } else if path.parent().is_some_and(Path::exists) {
        // On failure SQLite reports the real error when connecting.
        let _ = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path);
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        assert!(db.get_value("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_file_creates_private_database() {
        let dir = std::env::temp_dir().join("newsdeck_schema_test_open");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.db");
        let _ = std::fs::remove_file(&path);

        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.put_value("k", "v").await.unwrap();
        drop(db);

        let reopened = Database::open(path.to_str().unwrap()).await.unwrap();
        assert_eq!(reopened.get_value("k").await.unwrap().as_deref(), Some("v"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
