use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

/// Connection settings shared by the streaming and polling transports.
///
/// Credentials are attached transparently to every request; callers never
/// handle headers themselves.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    pub base_url: Option<String>,
    pub auth_token: Option<String>,
    pub connect_timeout: Option<Duration>,
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// Build the HTTP client with default JSON and authorization headers.
pub(crate) fn build_http_client(config: &TransportConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(token) = &config.auth_token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Invalid auth token format")?,
        );
    }

    let mut builder = reqwest::Client::builder().default_headers(headers);
    if let Some(timeout) = config.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    builder.build().context("Failed to create HTTP client")
}

/// Resolve an endpoint against the configured base URL. Absolute endpoints
/// pass through unchanged.
pub(crate) fn resolve_url(base_url: Option<&str>, endpoint: &str) -> String {
    match base_url {
        Some(base) if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") => {
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            )
        }
        _ => endpoint.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_style_config() {
        let config = TransportConfig::new()
            .base_url("https://api.example.com")
            .auth_token("secret")
            .connect_timeout(Duration::from_secs(5));

        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_resolve_url_joins_base() {
        assert_eq!(
            resolve_url(Some("https://api.example.com/"), "/chat/stream"),
            "https://api.example.com/chat/stream"
        );
    }

    #[test]
    fn test_resolve_url_passes_absolute() {
        assert_eq!(
            resolve_url(Some("https://api.example.com"), "https://other.example.com/x"),
            "https://other.example.com/x"
        );
        assert_eq!(resolve_url(None, "/chat/stream"), "/chat/stream");
    }
}
