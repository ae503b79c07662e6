use serde_json::Value;

use super::schema::Database;
use super::types::{DatabaseError, IdListKey};

impl Database {
    /// Load a persisted list of item ids, oldest first.
    ///
    /// Never fails: a missing key, unreadable row or malformed JSON all yield
    /// an empty list. Entries that are not integers are discarded.
    pub async fn load_id_list(&self, key: IdListKey) -> Vec<i64> {
        match self.get_value(key.as_str()).await {
            Ok(Some(raw)) => parse_id_list(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(key = key.as_str(), error = %e, "Storage load failed");
                Vec::new()
            }
        }
    }

    /// Persist a list of item ids as a plain JSON array of numbers.
    pub async fn save_id_list(&self, key: IdListKey, ids: &[i64]) -> Result<(), DatabaseError> {
        let encoded = serde_json::to_string(ids)?;
        self.put_value(key.as_str(), &encoded).await
    }
}

/// Parse a stored id list, keeping only entries that coerce to an integer.
///
/// Accepts integers, integral floats and numeric strings (`"12"`), matching
/// lists written by older clients. Anything that is not a JSON array yields
/// an empty list.
fn parse_id_list(raw: &str) -> Vec<i64> {
    let values = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(values)) => values,
        Ok(_) => {
            tracing::warn!("Stored id list is not an array, discarding");
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "Stored id list is malformed, discarding");
            return Vec::new();
        }
    };

    values.iter().filter_map(coerce_id).collect()
}

fn coerce_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_integers() {
        assert_eq!(parse_id_list("[3, 1, 2]"), vec![3, 1, 2]);
    }

    #[test]
    fn test_parse_discards_non_integers() {
        let parsed = parse_id_list(r#"[1, "7", 2.5, null, "abc", {"id": 4}, 9.0, true]"#);
        assert_eq!(parsed, vec![1, 7, 9]);
    }

    #[test]
    fn test_parse_malformed_is_empty() {
        assert!(parse_id_list("not json").is_empty());
        assert!(parse_id_list("").is_empty());
        assert!(parse_id_list(r#"{"ids": [1]}"#).is_empty());
        assert!(parse_id_list("42").is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let db = Database::open(":memory:").await.unwrap();
        db.save_id_list(IdListKey::ReadItems, &[5, 6, 7])
            .await
            .unwrap();

        assert_eq!(db.load_id_list(IdListKey::ReadItems).await, vec![5, 6, 7]);
        // Separate keys do not share data
        assert!(db.load_id_list(IdListKey::ReadSyncQueue).await.is_empty());
    }

    #[tokio::test]
    async fn test_load_malformed_row_is_empty() {
        let db = Database::open(":memory:").await.unwrap();
        db.put_value(IdListKey::ReadSyncQueue.as_str(), "[1, oops")
            .await
            .unwrap();

        assert!(db.load_id_list(IdListKey::ReadSyncQueue).await.is_empty());
    }
}
