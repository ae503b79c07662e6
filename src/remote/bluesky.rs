use reqwest::header::ACCEPT;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use url::Url;

use super::http::{read_limited_body, MAX_RESPONSE_SIZE};
use super::RemoteError;

/// Public, unauthenticated AppView endpoint.
pub const DEFAULT_RICH_EMBED_API_URL: &str = "https://public.api.bsky.app";

/// getPosts accepts at most 25 URIs; stay comfortably below.
const CHUNK_SIZE: usize = 20;

// ============================================================================
// Post Views
// ============================================================================

/// The subset of `app.bsky.feed.defs#postView` needed to render an embed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostView {
    pub uri: String,
    #[serde(default, deserialize_with = "lenient_embed")]
    pub embed: Option<EmbedView>,
}

/// A hydrated embed, keyed on its lexicon `$type`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "$type")]
pub enum EmbedView {
    #[serde(rename = "app.bsky.embed.external#view")]
    External { external: ExternalView },
    #[serde(rename = "app.bsky.embed.images#view")]
    Images {
        #[serde(default)]
        images: Vec<ImageView>,
    },
    #[serde(rename = "app.bsky.embed.record#view")]
    Record { record: RecordTarget },
    #[serde(rename = "app.bsky.embed.recordWithMedia#view")]
    RecordWithMedia {
        media: Box<EmbedView>,
        #[serde(deserialize_with = "nested_record")]
        record: RecordTarget,
    },
    #[serde(rename = "app.bsky.embed.video#view")]
    Video {
        #[serde(default)]
        playlist: Option<String>,
        #[serde(default)]
        thumbnail: Option<String>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ExternalView {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumb: Option<String>,
}

impl ExternalView {
    pub fn link(&self) -> Option<&str> {
        self.uri
            .as_deref()
            .or(self.url.as_deref())
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ImageView {
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub fullsize: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
}

/// A quoted post. Every field is optional because the AppView substitutes
/// `viewNotFound` / `viewBlocked` records that carry only a URI.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RecordTarget {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub value: Option<RecordValue>,
    #[serde(default, deserialize_with = "lenient_embeds")]
    pub embeds: Vec<EmbedView>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default)]
    pub did: Option<String>,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct RecordValue {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize)]
struct GetPostsResponse {
    #[serde(default)]
    posts: Vec<Value>,
}

/// An embed that fails to parse is dropped rather than failing the post.
fn lenient_embed<'de, D>(deserializer: D) -> Result<Option<EmbedView>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_embeds<'de, D>(deserializer: D) -> Result<Vec<EmbedView>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect())
}

/// `recordWithMedia#view.record` wraps the quoted record one level deeper.
fn nested_record<'de, D>(deserializer: D) -> Result<RecordTarget, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(default)]
        record: RecordTarget,
    }
    Ok(Wrapper::deserialize(deserializer)?.record)
}

// ============================================================================
// Lookup
// ============================================================================

/// Batched post lookup with a process-lifetime memo table.
///
/// Every URI ever requested stays in the table, including negative results
/// for posts the service did not return or for requests that failed. There
/// is no eviction.
pub struct PostLookup {
    http: reqwest::Client,
    endpoint: Url,
    cache: HashMap<String, Option<Arc<PostView>>>,
}

impl std::fmt::Debug for PostLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostLookup")
            .field("endpoint", &self.endpoint.as_str())
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl PostLookup {
    pub fn new(http: reqwest::Client, api_base: &str) -> Result<Self, RemoteError> {
        let mut base =
            Url::parse(api_base.trim()).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("xrpc/app.bsky.feed.getPosts")
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            cache: HashMap::new(),
        })
    }

    /// Memoised entry for `uri`, if it has been resolved before.
    pub fn cached(&self, uri: &str) -> Option<Option<Arc<PostView>>> {
        self.cache.get(uri).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Resolve a batch of post URIs, fetching only those not yet memoised.
    ///
    /// Never fails: posts that could not be loaded map to `None`.
    pub async fn resolve(&mut self, uris: &[String]) -> HashMap<String, Option<Arc<PostView>>> {
        let mut seen = HashSet::new();
        let missing: Vec<&String> = uris
            .iter()
            .filter(|uri| !self.cache.contains_key(uri.as_str()) && seen.insert(uri.as_str()))
            .collect();

        for chunk in missing.chunks(CHUNK_SIZE) {
            match self.fetch_chunk(chunk).await {
                Ok(posts) => {
                    tracing::debug!(requested = chunk.len(), returned = posts.len(), "Loaded posts");
                    for post in posts {
                        self.cache.insert(post.uri.clone(), Some(Arc::new(post)));
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, count = chunk.len(), "Unable to load rich embeds");
                }
            }
            for uri in chunk {
                self.cache.entry((*uri).clone()).or_insert(None);
            }
        }

        uris.iter()
            .map(|uri| (uri.clone(), self.cache.get(uri).cloned().flatten()))
            .collect()
    }

    async fn fetch_chunk(&self, uris: &[&String]) -> Result<Vec<PostView>, RemoteError> {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for uri in uris {
                pairs.append_pair("uris", uri);
            }
        }

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status().as_u16()));
        }
        let bytes = read_limited_body(response, MAX_RESPONSE_SIZE).await?;
        let parsed: GetPostsResponse = serde_json::from_slice(&bytes)?;

        Ok(parsed
            .posts
            .into_iter()
            .filter_map(|post| serde_json::from_value::<PostView>(post).ok())
            .filter(|post| !post.uri.is_empty())
            .collect())
    }
}
