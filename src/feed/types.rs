use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Remote Records
// ============================================================================

/// A single item as returned by the feed-reader service.
///
/// The remote `unread` field is loosely typed (absent, boolean, number, or any
/// other JSON value). It is normalized once here: absent or `null` means
/// unread, anything else follows JavaScript-style truthiness. Engagement
/// counters and other free-form fields land in `extra`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: i64,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Publish time in seconds since the epoch.
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub pub_date: Option<i64>,
    #[serde(default = "default_unread", deserialize_with = "deserialize_unread")]
    pub unread: bool,
    #[serde(default, deserialize_with = "deserialize_truthy")]
    pub starred: bool,
    #[serde(default)]
    pub enclosure_link: Option<String>,
    #[serde(default)]
    pub enclosure_mime: Option<String>,
    #[serde(default)]
    pub feed_id: Option<i64>,
    #[serde(default)]
    pub folder_id: Option<i64>,
    /// Not sent by Nextcloud itself, but present in some proxies and test fixtures.
    #[serde(default)]
    pub feed_title: Option<String>,
    #[serde(default)]
    pub feed_link: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeedItem {
    /// Minimal item, mostly useful for building fixtures.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            guid: None,
            url: None,
            title: None,
            body: None,
            pub_date: None,
            unread: true,
            starred: false,
            enclosure_link: None,
            enclosure_mime: None,
            feed_id: None,
            folder_id: None,
            feed_title: None,
            feed_link: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Folder {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feed {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub folder_id: Option<i64>,
}

/// Read-only folder and feed tables, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    pub folders: Vec<Folder>,
    pub feeds: Vec<Feed>,
}

impl Lookups {
    pub fn folder(&self, id: Option<i64>) -> Option<&Folder> {
        let id = id?;
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn feed(&self, id: Option<i64>) -> Option<&Feed> {
        let id = id?;
        self.feeds.iter().find(|f| f.id == id)
    }
}

// ============================================================================
// View Selection
// ============================================================================

/// Which items the list shows: only unread ones, or everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Unread,
    All,
}

impl ViewMode {
    pub fn includes_read(self) -> bool {
        self == ViewMode::All
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Unread => f.write_str("unread"),
            ViewMode::All => f.write_str("all"),
        }
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unread" | "unviewed" => Ok(ViewMode::Unread),
            "all" => Ok(ViewMode::All),
            other => Err(format!("unknown view mode '{other}' (expected unread or all)")),
        }
    }
}

/// The source of items: everything, one folder, or starred items only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FolderSelector {
    #[default]
    All,
    Folder(i64),
    Starred,
}

impl FolderSelector {
    pub fn folder_id(self) -> Option<i64> {
        match self {
            FolderSelector::Folder(id) => Some(id),
            FolderSelector::All | FolderSelector::Starred => None,
        }
    }

    pub fn is_starred(self) -> bool {
        self == FolderSelector::Starred
    }
}

// ============================================================================
// Loose JSON Coercion
// ============================================================================

fn default_unread() -> bool {
    true
}

/// JavaScript-style truthiness for loosely typed remote fields.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn deserialize_unread<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => true,
        other => is_truthy(&other),
    })
}

fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(is_truthy(&value))
}

/// Accepts epoch seconds, epoch milliseconds, numeric strings and RFC 3339 /
/// RFC 2822 dates. Anything else becomes `None`.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => parse_date_string(&s),
        _ => None,
    }
    .map(|ts| if ts > 1_000_000_000_000 { ts / 1000 } else { ts }))
}

fn parse_date_string(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(ts) = s.parse::<i64>() {
        return Some(ts);
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .or_else(|_| chrono::DateTime::parse_from_rfc2822(s))
        .map(|dt| dt.timestamp())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> FeedItem {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unread_absent_means_unread() {
        assert!(item(json!({"id": 1})).unread);
        assert!(item(json!({"id": 1, "unread": null})).unread);
    }

    #[test]
    fn test_unread_boolean_and_numeric() {
        assert!(item(json!({"id": 1, "unread": true})).unread);
        assert!(!item(json!({"id": 1, "unread": false})).unread);
        assert!(item(json!({"id": 1, "unread": 1})).unread);
        assert!(!item(json!({"id": 1, "unread": 0})).unread);
    }

    #[test]
    fn test_unread_other_values_use_truthiness() {
        assert!(item(json!({"id": 1, "unread": "yes"})).unread);
        assert!(!item(json!({"id": 1, "unread": ""})).unread);
        assert!(item(json!({"id": 1, "unread": []})).unread);
    }

    #[test]
    fn test_camel_case_fields_and_extra() {
        let parsed = item(json!({
            "id": 9,
            "enclosureLink": "https://cdn.example.com/a.png",
            "enclosureMime": "image/png",
            "feedId": 3,
            "pubDate": 1_700_000_000,
            "starred": true,
            "likes": 12
        }));
        assert_eq!(
            parsed.enclosure_link.as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(parsed.feed_id, Some(3));
        assert_eq!(parsed.pub_date, Some(1_700_000_000));
        assert!(parsed.starred);
        assert_eq!(parsed.extra.get("likes"), Some(&json!(12)));
    }

    #[test]
    fn test_pub_date_millis_and_strings() {
        assert_eq!(
            item(json!({"id": 1, "pubDate": 1_700_000_000_000i64})).pub_date,
            Some(1_700_000_000)
        );
        assert_eq!(
            item(json!({"id": 1, "pubDate": "2023-11-14T22:13:20Z"})).pub_date,
            Some(1_700_000_000)
        );
        assert_eq!(item(json!({"id": 1, "pubDate": "whenever"})).pub_date, None);
    }

    #[test]
    fn test_view_mode_from_str() {
        assert_eq!("all".parse::<ViewMode>(), Ok(ViewMode::All));
        assert_eq!("Unread".parse::<ViewMode>(), Ok(ViewMode::Unread));
        assert!("starred".parse::<ViewMode>().is_err());
    }

    #[test]
    fn test_lookups_join_by_id() {
        let lookups = Lookups {
            folders: vec![Folder {
                id: 2,
                name: "News".into(),
            }],
            feeds: vec![],
        };
        assert_eq!(lookups.folder(Some(2)).map(|f| f.name.as_str()), Some("News"));
        assert!(lookups.folder(None).is_none());
        assert!(lookups.feed(Some(2)).is_none());
    }
}
