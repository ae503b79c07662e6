use thiserror::Error;
use url::Url;

/// Errors that can occur while validating the feed-reader server URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates the base URL of the feed-reader server.
///
/// Self-hosted servers commonly live on private addresses, so unlike a
/// feed-source check this accepts any host. Plain `http` is allowed but
/// logged, since credentials travel with every request.
///
/// # Examples
///
/// ```
/// use newsdeck::util::validate_server_url;
///
/// let url = validate_server_url("https://cloud.example.com/").unwrap();
/// assert_eq!(url.host_str(), Some("cloud.example.com"));
///
/// assert!(validate_server_url("ftp://cloud.example.com").is_err());
/// assert!(validate_server_url("not a url").is_err());
/// ```
pub fn validate_server_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "https" => {}
        "http" => {
            tracing::warn!(
                host = url.host_str().unwrap_or_default(),
                "Server URL is not HTTPS; credentials are sent in clear text"
            );
        }
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(url)
}

/// Lowercased hostname of `raw`, or an empty string when it does not parse.
pub fn hostname(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default()
}

/// Hostname with a leading `www.` removed, for display.
pub fn display_hostname(raw: &str) -> String {
    let host = hostname(raw);
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_server_urls() {
        assert!(validate_server_url("https://cloud.example.com").is_ok());
        assert!(validate_server_url("http://192.168.1.10/nextcloud").is_ok());
        assert!(validate_server_url("  https://cloud.example.com/  ").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_server_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_server_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_unparseable() {
        assert!(matches!(
            validate_server_url(""),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_hostname() {
        assert_eq!(hostname("https://WWW.YouTube.com/watch?v=x"), "www.youtube.com");
        assert_eq!(hostname("garbage"), "");
    }

    #[test]
    fn test_display_hostname_strips_www() {
        assert_eq!(display_hostname("https://www.example.org/a"), "example.org");
        assert_eq!(display_hostname("https://news.example.org/a"), "news.example.org");
        assert_eq!(display_hostname(""), "");
    }
}
