use super::schema::Database;
use super::types::DatabaseError;

impl Database {
    /// Stored value for `key`, or `None` when it was never written.
    pub async fn get_value(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM local_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    /// Insert or overwrite `key`.
    pub async fn put_value(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO local_state (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_key() {
        let db = test_db().await;
        assert_eq!(db.get_value("read_state.read_items").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = test_db().await;
        db.put_value("read_state.sync_queue", "[1]").await.unwrap();
        db.put_value("read_state.sync_queue", "[]").await.unwrap();
        assert_eq!(
            db.get_value("read_state.sync_queue").await.unwrap().as_deref(),
            Some("[]")
        );
    }
}
