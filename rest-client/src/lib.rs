//! Private JSON/HTTP client for the sync2gear backend
//!
//! This crate provides a minimal blocking client for the sync2gear REST API.
//! It attaches bearer tokens to every request except the authentication
//! endpoints and transparently refreshes an expired access token once per
//! request when a refresh token is available.

mod error;

pub use error::RestError;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Endpoints that must never carry an `Authorization` header
const UNAUTHENTICATED_PATHS: [&str; 3] = ["/auth/login/", "/auth/signup/", "/auth/refresh/"];

const REFRESH_PATH: &str = "/auth/refresh/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

/// A minimal JSON client for the sync2gear REST API
///
/// Clones share the same HTTP agent and token storage, so a refresh performed
/// through one clone is visible to all of them.
#[derive(Debug, Clone)]
pub struct RestClient {
    agent: ureq::Agent,
    base_url: String,
    tokens: Arc<RwLock<Tokens>>,
}

impl RestClient {
    /// Create a new client with default timeouts (5s connect, 10s read)
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeouts(base_url, Duration::from_secs(5), Duration::from_secs(10))
    }

    /// Create a new client with explicit timeouts
    pub fn with_timeouts(base_url: impl Into<String>, connect: Duration, read: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(connect)
                .timeout_read(read)
                .build(),
            base_url,
            tokens: Arc::new(RwLock::new(Tokens::default())),
        }
    }

    /// Base URL every request path is appended to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Store the access token and, optionally, a refresh token
    pub fn set_tokens(&self, access: impl Into<String>, refresh: Option<String>) {
        if let Ok(mut tokens) = self.tokens.write() {
            tokens.access = Some(access.into());
            tokens.refresh = refresh;
        }
    }

    /// Forget both tokens
    pub fn clear_tokens(&self) {
        if let Ok(mut tokens) = self.tokens.write() {
            *tokens = Tokens::default();
        }
    }

    /// Current access token, if any
    pub fn access_token(&self) -> Option<String> {
        self.tokens.read().ok()?.access.clone()
    }

    /// GET `path` and decode the JSON response
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RestError> {
        let response = self.send(Method::Get, path, None)?;
        decode(response)
    }

    /// POST `body` as JSON to `path` and decode the JSON response
    ///
    /// An empty response body decodes as JSON `null`.
    pub fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RestError> {
        let body = serde_json::to_value(body).map_err(|e| RestError::Parse(e.to_string()))?;
        let response = self.send(Method::Post, path, Some(&body))?;
        decode(response)
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ureq::Response, RestError> {
        let url = self.url(path);
        let authenticated = requires_auth(path);
        let token = if authenticated { self.access_token() } else { None };

        tracing::debug!("{} {}", method.as_str(), url);

        match self.send_once(method, &url, body, token.as_deref()) {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(401, response)) if authenticated => {
                if !self.has_refresh_token() {
                    let body = response.into_string().unwrap_or_default();
                    return Err(RestError::Status { status: 401, body });
                }

                let access = self.refresh_access_token()?;
                self.send_once(method, &url, body, Some(&access))
                    .map_err(|e| match e {
                        ureq::Error::Status(401, _) => RestError::Unauthorized,
                        other => map_ureq_error(other),
                    })
            }
            Err(e) => Err(map_ureq_error(e)),
        }
    }

    fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> Result<ureq::Response, ureq::Error> {
        let mut request = self
            .agent
            .request(method.as_str(), url)
            .set("Content-Type", "application/json");

        if let Some(token) = token {
            request = request.set("Authorization", &format!("Bearer {}", token));
        }

        match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        }
    }

    fn has_refresh_token(&self) -> bool {
        self.tokens
            .read()
            .map(|t| t.refresh.is_some())
            .unwrap_or(false)
    }

    /// Exchange the refresh token for a new access token and store it
    fn refresh_access_token(&self) -> Result<String, RestError> {
        let refresh = self
            .tokens
            .read()
            .ok()
            .and_then(|t| t.refresh.clone())
            .ok_or(RestError::Unauthorized)?;

        let url = self.url(REFRESH_PATH);
        let request = RefreshRequest { refresh: &refresh };
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(&request)
            .map_err(|e| {
                tracing::warn!("Access token refresh failed: {}", e);
                RestError::Unauthorized
            })?;

        let RefreshResponse { access } = decode(response)?;

        if let Ok(mut tokens) = self.tokens.write() {
            tokens.access = Some(access.clone());
        }
        tracing::debug!("Access token refreshed");

        Ok(access)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn requires_auth(path: &str) -> bool {
    !UNAUTHENTICATED_PATHS.iter().any(|p| path.contains(p))
}

fn decode<T: DeserializeOwned>(response: ureq::Response) -> Result<T, RestError> {
    let text = response
        .into_string()
        .map_err(|e| RestError::Network(e.to_string()))?;

    let text = if text.trim().is_empty() { "null" } else { text.as_str() };

    serde_json::from_str(text).map_err(|e| RestError::Parse(e.to_string()))
}

fn map_ureq_error(error: ureq::Error) -> RestError {
    match error {
        ureq::Error::Status(status, response) => RestError::Status {
            status,
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => RestError::Network(transport.to_string()),
    }
}
