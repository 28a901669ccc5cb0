//! Configuration for the realtime feed subscriber

use std::time::Duration;

use crate::error::{FeedError, Result};

/// Configuration for `FeedSubscriber`
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL of the feed, e.g. `wss://api.sync2gear.com/ws`
    pub ws_base_url: String,

    /// Timeout for the WebSocket handshake
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Delay before the first reconnect attempt
    /// Default: 1 second
    pub initial_retry_delay: Duration,

    /// Upper bound for the reconnect delay
    /// Default: 30 seconds
    pub max_retry_delay: Duration,

    /// Consecutive failures before the feed is reported offline (0 = unlimited)
    /// Default: 8
    pub max_reconnect_attempts: u32,

    /// Interval between client pings
    /// Default: 25 seconds
    pub ping_interval: Duration,

    /// Messages larger than this are dropped
    /// Default: 1 MiB
    pub max_message_bytes: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_base_url: "ws://localhost:8000/ws".to_string(),
            connect_timeout: Duration::from_secs(10),
            initial_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
            max_reconnect_attempts: 8,
            ping_interval: Duration::from_secs(25),
            max_message_bytes: 1024 * 1024,
        }
    }
}

impl FeedConfig {
    pub fn new(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Reconnect quickly and give up early, for tests and local development
    pub fn fast_retry(ws_base_url: impl Into<String>) -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            initial_retry_delay: Duration::from_millis(50),
            max_retry_delay: Duration::from_millis(400),
            max_reconnect_attempts: 3,
            ping_interval: Duration::from_secs(5),
            ..Self::new(ws_base_url)
        }
    }

    /// Never give up reconnecting, for unattended displays
    pub fn persistent(ws_base_url: impl Into<String>) -> Self {
        Self {
            max_reconnect_attempts: 0,
            max_retry_delay: Duration::from_secs(60),
            ..Self::new(ws_base_url)
        }
    }

    pub fn with_retry(mut self, initial: Duration, max: Duration, attempts: u32) -> Self {
        self.initial_retry_delay = initial;
        self.max_retry_delay = max;
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn with_max_message_bytes(mut self, bytes: usize) -> Self {
        self.max_message_bytes = bytes;
        self
    }

    /// Delay before reconnect attempt `attempt` (1-based)
    ///
    /// Doubles from `initial_retry_delay` and is capped at `max_retry_delay`.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_retry_delay
            .saturating_mul(1 << exponent)
            .min(self.max_retry_delay)
    }

    /// Whether `failures` consecutive failures exhaust the reconnect budget
    pub fn is_exhausted(&self, failures: u32) -> bool {
        self.max_reconnect_attempts != 0 && failures >= self.max_reconnect_attempts
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        if !(self.ws_base_url.starts_with("ws://") || self.ws_base_url.starts_with("wss://")) {
            return Err(FeedError::Configuration(format!(
                "Feed base URL must use ws or wss: {}",
                self.ws_base_url
            )));
        }

        if self.initial_retry_delay.is_zero() {
            return Err(FeedError::Configuration(
                "Initial retry delay must be greater than 0".to_string(),
            ));
        }

        if self.initial_retry_delay > self.max_retry_delay {
            return Err(FeedError::Configuration(
                "Invalid retry delay: initial must not exceed max".to_string(),
            ));
        }

        if self.ping_interval.is_zero() || self.connect_timeout.is_zero() {
            return Err(FeedError::Configuration(
                "Ping interval and connect timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_message_bytes == 0 {
            return Err(FeedError::Configuration(
                "Max message size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
