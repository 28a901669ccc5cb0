use rest_client::RestError;
use thiserror::Error;

/// High-level API errors for sync2gear operations
///
/// This enum abstracts away the underlying HTTP details and gives callers
/// the failure categories they actually act on: retry, re-authenticate, or
/// report to the operator.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network communication error
    ///
    /// The backend could not be reached: connection refused, DNS failure,
    /// timeout. These are the only errors the retry policy acts on.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The backend rejected the request with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Response parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid parameter value
    ///
    /// Returned before any request is sent: volume out of range, empty zone
    /// id, negative seek position.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The session is not authenticated and could not be refreshed
    #[error("Unauthorized")]
    Unauthorized,
}

impl ApiError {
    /// Whether the failure is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::NetworkError(_))
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

impl From<RestError> for ApiError {
    fn from(error: RestError) -> Self {
        match error {
            RestError::Network(msg) => ApiError::NetworkError(msg),
            RestError::Status { status, body } => ApiError::Http {
                status,
                message: extract_detail(&body),
            },
            RestError::Parse(msg) => ApiError::ParseError(msg),
            RestError::Unauthorized => ApiError::Unauthorized,
        }
    }
}

/// Pull the human-readable message out of a DRF-style error body
///
/// The backend answers errors as `{"detail": "..."}` or `{"error": "..."}`;
/// anything else is passed through verbatim.
fn extract_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["detail", "error", "message"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(String::from))
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_error_conversion() {
        let api_error: ApiError = RestError::Network("connection reset".to_string()).into();
        assert!(matches!(api_error, ApiError::NetworkError(_)));
        assert!(api_error.is_transient());

        let api_error: ApiError = RestError::Parse("trailing comma".to_string()).into();
        assert!(matches!(api_error, ApiError::ParseError(_)));

        let api_error: ApiError = RestError::Unauthorized.into();
        assert!(matches!(api_error, ApiError::Unauthorized));
        assert!(!api_error.is_transient());
    }

    #[test]
    fn test_status_detail_extracted() {
        let api_error: ApiError = RestError::Status {
            status: 400,
            body: r#"{"detail": "volume is required"}"#.to_string(),
        }
        .into();

        match api_error {
            ApiError::Http { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "volume is required");
            }
            other => panic!("Expected Http error, got {:?}", other),
        }
    }

    #[test]
    fn test_status_plain_body_passed_through() {
        let api_error: ApiError = RestError::Status {
            status: 502,
            body: "Bad Gateway".to_string(),
        }
        .into();

        assert_eq!(api_error.to_string(), "HTTP 502: Bad Gateway");
    }
}
