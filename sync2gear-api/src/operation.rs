//! Operation trait, retry policy and the operation definition macro

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// HTTP method an operation is sent with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Base trait for all sync2gear API operations
///
/// An operation is a stateless description of one backend endpoint: where it
/// lives, what it sends and how its answer is decoded. `Sync2gearClient`
/// executes operations; nothing here touches the network.
pub trait ControlOperation {
    /// The request type for this operation
    type Request: Serialize;

    /// The decoded response type
    type Response: DeserializeOwned;

    /// HTTP method used for the request
    const METHOD: HttpMethod;

    /// Endpoint path relative to the API base URL
    const PATH: &'static str;

    /// Operation name used in logs
    const NAME: &'static str;

    /// Full request path, including a query string when needed
    fn path(_request: &Self::Request) -> String {
        Self::PATH.to_string()
    }

    /// Reject invalid requests before anything is sent
    fn validate(_request: &Self::Request) -> Result<()> {
        Ok(())
    }

    /// Decode the JSON body the backend answered with
    ///
    /// An empty body arrives as `null` and is decoded as an empty object.
    fn parse_response(value: serde_json::Value) -> Result<Self::Response> {
        let value = if value.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            value
        };
        serde_json::from_value(value).map_err(|e| ApiError::ParseError(e.to_string()))
    }
}

/// Response of control endpoints, which only echo a message
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub message: Option<String>,
}

/// Retry policy for operations that fail on the network
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// Create a retry policy with no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            exponential_backoff: false,
        }
    }

    /// Create a retry policy with fixed delays
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay: delay,
            exponential_backoff: false,
        }
    }

    /// Create a retry policy with exponential backoff
    pub fn exponential(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            exponential_backoff: true,
        }
    }

    /// Calculate the delay for a given retry attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || attempt > self.max_retries {
            return Duration::ZERO;
        }

        if self.exponential_backoff {
            self.base_delay * 2_u32.pow(attempt - 1)
        } else {
            self.base_delay
        }
    }
}

/// Check that a zone id was supplied
pub(crate) fn require_zone(zone_id: &str) -> Result<()> {
    if zone_id.trim().is_empty() {
        return Err(ApiError::InvalidParameter("zone_id must not be empty".to_string()));
    }
    Ok(())
}

/// Define a zone-scoped POST control operation
///
/// Generates the request struct (`<Operation>Request`, always carrying
/// `zone_id`), the operation marker type and its `ControlOperation` impl.
///
/// # Example
/// ```rust,ignore
/// define_zone_operation! {
///     operation: SetVolume,
///     path: "/playback/control/volume/",
///     request: {
///         volume: u8,
///     },
///     validate: |req| check_volume(req.volume),
/// }
/// ```
#[macro_export]
macro_rules! define_zone_operation {
    (
        operation: $op:ident,
        path: $path:literal,
        request: {
            $($(#[$meta:meta])* $field:ident: $field_type:ty),* $(,)?
        } $(,)?
        $(validate: |$req:ident| $validate:expr $(,)?)?
    ) => {
        paste::paste! {
            #[derive(serde::Serialize, Clone, Debug, PartialEq)]
            pub struct [<$op Request>] {
                pub zone_id: String,
                $($(#[$meta])* pub $field: $field_type,)*
            }

            pub struct $op;

            impl $crate::operation::ControlOperation for $op {
                type Request = [<$op Request>];
                type Response = $crate::operation::Acknowledgement;

                const METHOD: $crate::operation::HttpMethod = $crate::operation::HttpMethod::Post;
                const PATH: &'static str = $path;
                const NAME: &'static str = stringify!($op);

                fn validate(request: &Self::Request) -> $crate::Result<()> {
                    $crate::operation::require_zone(&request.zone_id)?;
                    $(
                        let $req = request;
                        $validate?;
                    )?
                    Ok(())
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_exponential() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::ZERO);
    }

    #[test]
    fn test_retry_policy_fixed_and_none() {
        let policy = RetryPolicy::fixed(2, Duration::from_millis(50));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(50));

        let none = RetryPolicy::none();
        assert_eq!(none.max_retries, 0);
        assert_eq!(none.delay_for_attempt(1), Duration::ZERO);
    }

    #[test]
    fn test_require_zone() {
        assert!(require_zone("2f1c9a4e-0000-4000-8000-000000000001").is_ok());
        assert!(matches!(require_zone("  "), Err(ApiError::InvalidParameter(_))));
    }

    #[test]
    fn test_acknowledgement_from_empty_body() {
        struct Probe;
        impl ControlOperation for Probe {
            type Request = ();
            type Response = Acknowledgement;
            const METHOD: HttpMethod = HttpMethod::Post;
            const PATH: &'static str = "/probe/";
            const NAME: &'static str = "Probe";
        }

        let ack = Probe::parse_response(serde_json::Value::Null).unwrap();
        assert_eq!(ack, Acknowledgement::default());

        let ack = Probe::parse_response(serde_json::json!({"message": "Paused"})).unwrap();
        assert_eq!(ack.message.as_deref(), Some("Paused"));
    }
}
