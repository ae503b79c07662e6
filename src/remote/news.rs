use reqwest::header::ACCEPT;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use super::http::{read_limited_body, MAX_RESPONSE_SIZE};
use super::RemoteError;
use crate::feed::{Feed, FeedItem, Folder, FolderSelector};
use crate::util::validate_server_url;

const API_PATH: &str = "index.php/apps/news/api/v1-3/";

/// Parameters for one page of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemQuery {
    pub selector: FolderSelector,
    pub include_read: bool,
    pub batch_size: usize,
    pub offset: usize,
}

impl ItemQuery {
    /// Nextcloud News item type: 1 = folder, 2 = starred, 3 = all.
    fn type_code(&self) -> &'static str {
        match self.selector {
            FolderSelector::Starred => "2",
            FolderSelector::All => "3",
            FolderSelector::Folder(_) => "1",
        }
    }
}

#[derive(Deserialize)]
struct FoldersEnvelope {
    #[serde(default)]
    folders: Option<Vec<Folder>>,
}

#[derive(Deserialize)]
struct FeedsEnvelope {
    #[serde(default)]
    feeds: Option<Vec<Feed>>,
}

/// Items stay untyped here so one malformed entry cannot sink the page.
#[derive(Deserialize)]
struct ItemsEnvelope {
    #[serde(default)]
    items: Option<Vec<serde_json::Value>>,
}

/// Client for the Nextcloud News REST API (v1-3).
///
/// Credentials are passed through as HTTP basic auth on every request.
#[derive(Clone)]
pub struct NewsClient {
    http: reqwest::Client,
    api_base: Url,
    username: String,
    password: SecretString,
}

impl std::fmt::Debug for NewsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsClient")
            .field("api_base", &self.api_base.as_str())
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl NewsClient {
    /// Build a client for the server at `server_url` (the Nextcloud root,
    /// e.g. `https://cloud.example.com` or `https://example.com/nextcloud`).
    pub fn new(
        http: reqwest::Client,
        server_url: &str,
        username: &str,
        password: SecretString,
    ) -> Result<Self, RemoteError> {
        let mut base =
            validate_server_url(server_url).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let api_base = base
            .join(API_PATH)
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;

        Ok(Self {
            http,
            api_base,
            username: username.to_string(),
            password,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.api_base
            .join(path)
            .map_err(|e| RemoteError::InvalidUrl(e.to_string()))
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header(ACCEPT, "application/json")
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        let response = self.request(Method::GET, url).send().await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status().as_u16()));
        }
        let bytes = read_limited_body(response, MAX_RESPONSE_SIZE).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn mutate(&self, method: Method, path: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(path)?;
        let response = self.request(method, url).send().await?;
        if !response.status().is_success() {
            return Err(RemoteError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }

    pub async fn folders(&self) -> Result<Vec<Folder>, RemoteError> {
        let envelope: FoldersEnvelope = self.get_json(self.endpoint("folders")?).await?;
        Ok(envelope.folders.unwrap_or_default())
    }

    pub async fn feeds(&self) -> Result<Vec<Feed>, RemoteError> {
        let envelope: FeedsEnvelope = self.get_json(self.endpoint("feeds")?).await?;
        Ok(envelope.feeds.unwrap_or_default())
    }

    /// Fetch one page of items. `null` entries and entries that do not
    /// parse as an item are dropped.
    pub async fn items(&self, query: &ItemQuery) -> Result<Vec<FeedItem>, RemoteError> {
        let mut url = self.endpoint("items")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("type", query.type_code())
                .append_pair("getRead", if query.include_read { "true" } else { "false" })
                .append_pair("batchSize", &query.batch_size.to_string())
                .append_pair("offset", &query.offset.to_string());
            if let Some(folder_id) = query.selector.folder_id() {
                pairs.append_pair("id", &folder_id.to_string());
            }
        }

        let envelope: ItemsEnvelope = self.get_json(url).await?;
        Ok(envelope
            .items
            .unwrap_or_default()
            .into_iter()
            .filter(|value| !value.is_null())
            .filter_map(|value| match serde_json::from_value::<FeedItem>(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed item");
                    None
                }
            })
            .collect())
    }

    /// Mark a single item read. Idempotent on the server.
    pub async fn mark_read(&self, item_id: i64) -> Result<(), RemoteError> {
        self.mutate(Method::PUT, &format!("items/{item_id}/read"))
            .await
    }

    pub async fn set_starred(&self, item_id: i64, starred: bool) -> Result<(), RemoteError> {
        let action = if starred { "star" } else { "unstar" };
        self.mutate(Method::POST, &format!("items/{item_id}/{action}"))
            .await
    }
}
