use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

use super::html::strip_html;
use crate::feed::FeedItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Replies,
    Comments,
    Reposts,
    Shares,
    Likes,
}

impl MetricKind {
    const ALL: [MetricKind; 5] = [
        MetricKind::Replies,
        MetricKind::Comments,
        MetricKind::Reposts,
        MetricKind::Shares,
        MetricKind::Likes,
    ];

    fn key(self) -> &'static str {
        match self {
            MetricKind::Replies => "replies",
            MetricKind::Comments => "comments",
            MetricKind::Reposts => "reposts",
            MetricKind::Shares => "shares",
            MetricKind::Likes => "likes",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MetricKind::Replies => "Replies",
            MetricKind::Comments => "Comments",
            MetricKind::Reposts => "Reposts",
            MetricKind::Shares => "Shares",
            MetricKind::Likes => "Likes",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            MetricKind::Replies | MetricKind::Comments => "💬",
            MetricKind::Reposts | MetricKind::Shares => "↻",
            MetricKind::Likes => "❤",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Count(i64),
    /// A numeric field that is not a whole number, or a scraped count that
    /// did not parse.
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Count(n) => f.write_str(&group_thousands(*n)),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub kind: MetricKind,
    pub value: MetricValue,
}

static TEXT_PATTERNS: LazyLock<[(MetricKind, Regex); 3]> = LazyLock::new(|| {
    let re = |pattern: &str| {
        Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern: {e}"))
    };
    [
        (MetricKind::Replies, re(r"(?i)Replies?:\s*([\d,]+)")),
        (MetricKind::Reposts, re(r"(?i)Reposts?:\s*([\d,]+)")),
        (MetricKind::Likes, re(r"(?i)Likes?:\s*([\d,]+)")),
    ]
});

/// Engagement counts for an item.
///
/// Numeric fields on the item (top level or under `metrics`) win. Only when
/// there are none is the body text scanned for `Replies: N`-style labels.
pub fn extract_metrics(item: &FeedItem) -> Vec<Metric> {
    let nested = item.extra.get("metrics").and_then(Value::as_object);

    let direct: Vec<Metric> = MetricKind::ALL
        .iter()
        .filter_map(|&kind| {
            let value = match item.extra.get(kind.key()) {
                Some(v) if !v.is_null() => Some(v),
                _ => nested.and_then(|m| m.get(kind.key())),
            }?;
            let Value::Number(number) = value else {
                return None;
            };
            let value = match number.as_i64() {
                Some(n) => MetricValue::Count(n),
                None => match number.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        MetricValue::Count(f as i64)
                    }
                    _ => MetricValue::Text(number.to_string()),
                },
            };
            Some(Metric { kind, value })
        })
        .collect();
    if !direct.is_empty() {
        return direct;
    }

    let Some(body) = item.body.as_deref().filter(|b| !b.is_empty()) else {
        return Vec::new();
    };
    let text = strip_html(body);

    TEXT_PATTERNS
        .iter()
        .filter_map(|(kind, pattern)| {
            let raw = pattern.captures(&text)?.get(1)?.as_str();
            let value = raw
                .replace(',', "")
                .parse::<i64>()
                .map(MetricValue::Count)
                .unwrap_or_else(|_| MetricValue::Text(raw.to_string()));
            Some(Metric { kind: *kind, value })
        })
        .collect()
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn item(value: Value) -> FeedItem {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_direct_fields_in_order() {
        let metrics = extract_metrics(&item(json!({
            "id": 1,
            "likes": 12,
            "metrics": {"replies": 3, "likes": 99},
            "reposts": null,
            "shares": "7"
        })));
        assert_eq!(
            metrics,
            vec![
                Metric { kind: MetricKind::Replies, value: MetricValue::Count(3) },
                Metric { kind: MetricKind::Likes, value: MetricValue::Count(12) },
            ]
        );
    }

    #[test]
    fn test_body_fallback() {
        let metrics = extract_metrics(&item(json!({
            "id": 1,
            "body": "<p>replies: 4 · Reposts: 1,204 · LIKE: ,</p>"
        })));
        assert_eq!(
            metrics,
            vec![
                Metric { kind: MetricKind::Replies, value: MetricValue::Count(4) },
                Metric { kind: MetricKind::Reposts, value: MetricValue::Count(1204) },
                Metric { kind: MetricKind::Likes, value: MetricValue::Text(",".into()) },
            ]
        );
    }

    #[test]
    fn test_direct_fields_suppress_body_scan() {
        let metrics = extract_metrics(&item(json!({
            "id": 1,
            "comments": 2,
            "body": "Likes: 50"
        })));
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].kind, MetricKind::Comments);
    }

    #[test]
    fn test_no_metrics() {
        assert!(extract_metrics(&FeedItem::new(1)).is_empty());
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(MetricValue::Count(1234567).to_string(), "1,234,567");
        assert_eq!(MetricValue::Count(999).to_string(), "999");
        assert_eq!(MetricValue::Count(-1000).to_string(), "-1,000");
        assert_eq!(MetricValue::Text("2.5".into()).to_string(), "2.5");
    }
}
