//! Client configuration
//!
//! Connection settings for the REST API and the realtime feed. Values come
//! from `Default`, the environment, or the builder methods.

use std::time::Duration;

use crate::error::{ApiError, Result};
use crate::operation::RetryPolicy;

pub const ENV_API_BASE_URL: &str = "SYNC2GEAR_API_BASE_URL";
pub const ENV_WS_BASE_URL: &str = "SYNC2GEAR_WS_BASE_URL";
pub const ENV_ACCESS_TOKEN: &str = "SYNC2GEAR_ACCESS_TOKEN";
pub const ENV_REFRESH_TOKEN: &str = "SYNC2GEAR_REFRESH_TOKEN";

/// Configuration for `Sync2gearClient`
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API
    /// Default: http://localhost:8000/api/v1
    pub api_base_url: String,

    /// Base URL of the realtime feed
    /// Default: derived from `api_base_url` (ws scheme, `/ws` path)
    pub ws_base_url: String,

    /// Bearer token attached to authenticated requests
    pub access_token: Option<String>,

    /// Token exchanged for a new access token on HTTP 401
    pub refresh_token: Option<String>,

    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// Default: 10 seconds
    pub read_timeout: Duration,

    /// Retry policy for network failures
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api/v1".to_string(),
            ws_base_url: "ws://localhost:8000/ws".to_string(),
            access_token: None,
            refresh_token: None,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from `SYNC2GEAR_*` environment variables
    ///
    /// Unset variables keep their defaults. When only the API URL is set, the
    /// feed URL is derived from it.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(api) = non_empty(ENV_API_BASE_URL) {
            config = config.with_api_base_url(api);
        }
        if let Some(ws) = non_empty(ENV_WS_BASE_URL) {
            config.ws_base_url = ws.trim_end_matches('/').to_string();
        }
        config.access_token = non_empty(ENV_ACCESS_TOKEN);
        config.refresh_token = non_empty(ENV_REFRESH_TOKEN);
        config
    }

    /// Set the API URL and derive the feed URL from it
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self.ws_base_url = derive_ws_base_url(&self.api_base_url);
        self
    }

    pub fn with_ws_base_url(mut self, url: impl Into<String>) -> Self {
        self.ws_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_tokens(mut self, access: impl Into<String>, refresh: Option<String>) -> Self {
        self.access_token = Some(access.into());
        self.refresh_token = refresh;
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(ApiError::InvalidParameter(format!(
                "API base URL must use http or https: {}",
                self.api_base_url
            )));
        }

        if !(self.ws_base_url.starts_with("ws://") || self.ws_base_url.starts_with("wss://")) {
            return Err(ApiError::InvalidParameter(format!(
                "Feed base URL must use ws or wss: {}",
                self.ws_base_url
            )));
        }

        if self.connect_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(ApiError::InvalidParameter(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if self.refresh_token.is_some() && self.access_token.is_none() {
            return Err(ApiError::InvalidParameter(
                "A refresh token requires an access token".to_string(),
            ));
        }

        Ok(())
    }
}

/// `http://host/api/v1` becomes `ws://host/ws`
fn derive_ws_base_url(api_base_url: &str) -> String {
    let (scheme, rest) = if let Some(rest) = api_base_url.strip_prefix("https://") {
        ("wss", rest)
    } else if let Some(rest) = api_base_url.strip_prefix("http://") {
        ("ws", rest)
    } else {
        ("ws", api_base_url)
    };

    let host = rest.split('/').next().unwrap_or(rest);
    format!("{}://{}/ws", scheme, host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_ws_url_derived_from_api_url() {
        let config = ClientConfig::new().with_api_base_url("https://api.sync2gear.com/api/v1/");
        assert_eq!(config.api_base_url, "https://api.sync2gear.com/api/v1");
        assert_eq!(config.ws_base_url, "wss://api.sync2gear.com/ws");

        let config = ClientConfig::new().with_api_base_url("http://10.0.0.5:8000/api/v1");
        assert_eq!(config.ws_base_url, "ws://10.0.0.5:8000/ws");
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = [
            (ENV_API_BASE_URL, "https://api.example.com/api/v1"),
            (ENV_ACCESS_TOKEN, "abc"),
            (ENV_REFRESH_TOKEN, ""),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.api_base_url, "https://api.example.com/api/v1");
        assert_eq!(config.ws_base_url, "wss://api.example.com/ws");
        assert_eq!(config.access_token.as_deref(), Some("abc"));
        assert!(config.refresh_token.is_none());
    }

    #[test]
    fn test_explicit_ws_url_wins() {
        let env: HashMap<&str, &str> = [
            (ENV_API_BASE_URL, "https://api.example.com/api/v1"),
            (ENV_WS_BASE_URL, "wss://feed.example.com/ws/"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.ws_base_url, "wss://feed.example.com/ws");
    }

    #[test]
    fn test_validation_failures() {
        let config = ClientConfig::new().with_ws_base_url("http://wrong");
        assert!(config.validate().is_err());

        let mut config = ClientConfig::new();
        config.api_base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());

        let config = ClientConfig::new().with_timeouts(Duration::ZERO, Duration::from_secs(1));
        assert!(config.validate().is_err());

        let mut config = ClientConfig::new();
        config.refresh_token = Some("r".to_string());
        assert!(config.validate().is_err());
    }
}
