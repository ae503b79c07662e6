//! Configuration file parser for ~/.config/newsdeck/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`,
//! which has no remote endpoint. The deck still works offline in that case:
//! the local read overlay is fully functional and every sync is a no-op.
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::Path;
use thiserror::Error;

use crate::card::CardOptions;
use crate::feed::PageSizes;
use crate::remote::DEFAULT_RICH_EMBED_API_URL;

/// Excerpt length used when the config asks for none.
const DEFAULT_POST_CONTENT_LIMIT: usize = 280;

/// Environment variable that overrides `password` from the file.
pub const PASSWORD_ENV: &str = "NEWSDECK_PASSWORD";

/// Username shipped in sample configs; treated as "not configured".
const PLACEHOLDER_USERNAME: &str = "YOUR_USERNAME";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

/// Top-level configuration. Any subset of keys may be given.
#[derive(Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root URL of the Nextcloud instance hosting the News app.
    pub server_url: Option<String>,
    pub username: Option<String>,
    /// Basic-auth password. `NEWSDECK_PASSWORD` takes precedence.
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
    /// Page size for the unread view (which does not paginate).
    pub initial_batch_size: usize,
    /// Page size for the read-inclusive view.
    pub items_per_page: usize,
    pub show_post_content: bool,
    pub post_content_limit: usize,
    /// Base URL of the public Bluesky AppView used for rich embeds.
    pub rich_embed_api_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            username: None,
            password: None,
            initial_batch_size: 50,
            items_per_page: 50,
            show_post_content: true,
            post_content_limit: DEFAULT_POST_CONTENT_LIMIT,
            rich_embed_api_url: DEFAULT_RICH_EMBED_API_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("initial_batch_size", &self.initial_batch_size)
            .field("items_per_page", &self.items_per_page)
            .field("show_post_content", &self.show_post_content)
            .field("post_content_limit", &self.post_content_limit)
            .field("rich_embed_api_url", &self.rich_embed_api_url)
            .finish()
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

const KNOWN_KEYS: &[&str] = &[
    "server_url",
    "username",
    "password",
    "initial_batch_size",
    "items_per_page",
    "show_post_content",
    "post_content_limit",
    "rich_embed_api_url",
];

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as a warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse TOML text; blank input yields the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys().filter(|k| !KNOWN_KEYS.contains(&k.as_str())) {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            remote = config.is_remote_configured(),
            items_per_page = config.items_per_page,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// A remote is configured when a server URL and a real username are set.
    pub fn is_remote_configured(&self) -> bool {
        let has_url = self
            .server_url
            .as_deref()
            .is_some_and(|u| !u.trim().is_empty());
        let has_user = self
            .username
            .as_deref()
            .is_some_and(|u| !u.is_empty() && u != PLACEHOLDER_USERNAME);
        has_url && has_user
    }

    /// Effective password: the environment variable, else the file value,
    /// else empty.
    pub fn resolve_password(&self) -> SecretString {
        self.password_with_override(std::env::var(PASSWORD_ENV).ok())
    }

    fn password_with_override(&self, env_value: Option<String>) -> SecretString {
        use secrecy::ExposeSecret;

        match env_value.filter(|v| !v.is_empty()) {
            Some(value) => SecretString::from(value),
            None => self
                .password
                .as_ref()
                .map(|p| SecretString::from(p.expose_secret()))
                .unwrap_or_else(|| SecretString::from("")),
        }
    }

    pub fn page_sizes(&self) -> PageSizes {
        PageSizes {
            initial_batch: self.initial_batch_size.max(1),
            per_page: self.items_per_page.max(1),
        }
    }

    pub fn card_options(&self) -> CardOptions {
        CardOptions {
            show_post_content: self.show_post_content,
            post_content_limit: match self.post_content_limit {
                0 => DEFAULT_POST_CONTENT_LIMIT,
                limit => limit,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.initial_batch_size, 50);
        assert_eq!(config.items_per_page, 50);
        assert!(config.show_post_content);
        assert_eq!(config.post_content_limit, 280);
        assert_eq!(config.rich_embed_api_url, DEFAULT_RICH_EMBED_API_URL);
        assert!(!config.is_remote_configured());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/newsdeck_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert!(config.server_url.is_none());
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        let config = Config::parse("   \n  \n  ").unwrap();
        assert_eq!(config.items_per_page, 50);
    }

    #[test]
    fn test_full_config() {
        let config = Config::parse(
            r#"
server_url = "https://cloud.example.com"
username = "reader"
password = "file-secret"
initial_batch_size = 20
items_per_page = 10
show_post_content = false
post_content_limit = 140
rich_embed_api_url = "https://appview.example"
"#,
        )
        .unwrap();
        assert!(config.is_remote_configured());
        assert_eq!(config.page_sizes(), PageSizes { initial_batch: 20, per_page: 10 });
        assert!(!config.card_options().show_post_content);
        assert_eq!(config.card_options().post_content_limit, 140);
        assert_eq!(config.rich_embed_api_url, "https://appview.example");
        assert_eq!(
            config.password_with_override(None).expose_secret(),
            "file-secret"
        );
    }

    #[test]
    fn test_zero_limits_fall_back() {
        let config = Config::parse("post_content_limit = 0\ninitial_batch_size = 0").unwrap();
        assert_eq!(config.card_options().post_content_limit, 280);
        assert_eq!(config.page_sizes().initial_batch, 1);
    }

    #[test]
    fn test_placeholder_username_is_unconfigured() {
        let config = Config::parse(
            "server_url = \"https://cloud.example.com\"\nusername = \"YOUR_USERNAME\"\n",
        )
        .unwrap();
        assert!(!config.is_remote_configured());

        let no_url = Config::parse("username = \"reader\"\n").unwrap();
        assert!(!no_url.is_remote_configured());
    }

    #[test]
    fn test_env_password_takes_precedence() {
        let config = Config::parse("password = \"file-secret\"\n").unwrap();
        assert_eq!(
            config
                .password_with_override(Some("env-secret".into()))
                .expose_secret(),
            "env-secret"
        );
        assert_eq!(
            Config::default()
                .password_with_override(None)
                .expose_secret(),
            ""
        );
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("items_per_page = 5\ntheme = \"dark\"\n").unwrap();
        assert_eq!(config.items_per_page, 5);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("items_per_page = \"many\"\n").is_err());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("newsdeck_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join("newsdeck_config_test_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "post_content_limit = 99\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.post_content_limit, 99);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_debug_masks_password() {
        let config = Config::parse("password = \"super-secret-12345\"\n").unwrap();
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
