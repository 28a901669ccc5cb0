//! Feed health tracking
//!
//! Watches the connection status and the time since the last snapshot so the
//! operator can tell when the displayed state may be out of date.

use std::time::{Duration, Instant};

use sync2gear_stream::ConnectionStatus;

use crate::notice::{Notice, NoticeScope};

/// A change in feed health worth telling the operator about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    /// No snapshot for longer than the staleness threshold
    Stale,
    /// A snapshot arrived after the feed went stale
    Recovered,
    /// The connection dropped or gave up
    Degraded(ConnectionStatus),
    /// The connection is back after being degraded
    Reconnected,
}

impl HealthTransition {
    pub fn notice(self, stale_after: Duration) -> Notice {
        match self {
            HealthTransition::Stale => Notice::warning(
                NoticeScope::Feed,
                format!(
                    "No playback update for {}s; the shown state may be out of date",
                    stale_after.as_secs()
                ),
            ),
            HealthTransition::Recovered => {
                Notice::info(NoticeScope::Feed, "Playback updates resumed")
            }
            HealthTransition::Degraded(ConnectionStatus::Offline) => Notice::error(
                NoticeScope::Feed,
                "Realtime feed offline; select the zone again to retry",
            ),
            HealthTransition::Degraded(_) => {
                Notice::warning(NoticeScope::Feed, "Realtime feed disconnected; reconnecting")
            }
            HealthTransition::Reconnected => {
                Notice::info(NoticeScope::Feed, "Realtime feed reconnected")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedHealth {
    stale_after: Duration,
    armed_at: Instant,
    last_snapshot: Option<Instant>,
    status: ConnectionStatus,
    degraded: Option<ConnectionStatus>,
    stale: bool,
}

impl FeedHealth {
    pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(45);

    pub fn new(stale_after: Duration) -> Self {
        Self {
            stale_after,
            armed_at: Instant::now(),
            last_snapshot: None,
            status: ConnectionStatus::Disconnected,
            degraded: None,
            stale: false,
        }
    }

    /// Start tracking a new zone selection
    pub fn reset(&mut self, now: Instant) {
        self.armed_at = now;
        self.last_snapshot = None;
        self.status = ConnectionStatus::Connecting;
        self.degraded = None;
        self.stale = false;
    }

    pub fn record_snapshot(&mut self, now: Instant) -> Option<HealthTransition> {
        self.last_snapshot = Some(now);
        if self.stale {
            self.stale = false;
            return Some(HealthTransition::Recovered);
        }
        None
    }

    pub fn record_status(&mut self, status: ConnectionStatus) -> Option<HealthTransition> {
        self.status = status;
        match status {
            ConnectionStatus::Connected => {
                self.degraded.take().map(|_| HealthTransition::Reconnected)
            }
            ConnectionStatus::Connecting => None,
            ConnectionStatus::Disconnected | ConnectionStatus::Offline => {
                if self.degraded == Some(status) {
                    return None;
                }
                self.degraded = Some(status);
                Some(HealthTransition::Degraded(status))
            }
        }
    }

    /// Report entering the stale state, once
    pub fn check(&mut self, now: Instant) -> Option<HealthTransition> {
        if self.stale {
            return None;
        }
        let since = self.last_snapshot.unwrap_or(self.armed_at);
        if now.saturating_duration_since(since) >= self.stale_after {
            self.stale = true;
            return Some(HealthTransition::Stale);
        }
        None
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn last_snapshot(&self) -> Option<Instant> {
        self.last_snapshot
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }
}

impl Default for FeedHealth {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STALE_AFTER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_reported_once_then_recovers() {
        let start = Instant::now();
        let mut health = FeedHealth::new(Duration::from_secs(10));
        health.reset(start);

        assert_eq!(health.check(start + Duration::from_secs(5)), None);
        assert_eq!(
            health.check(start + Duration::from_secs(10)),
            Some(HealthTransition::Stale)
        );
        assert_eq!(health.check(start + Duration::from_secs(20)), None);
        assert!(health.is_stale());

        assert_eq!(
            health.record_snapshot(start + Duration::from_secs(21)),
            Some(HealthTransition::Recovered)
        );
        assert_eq!(health.check(start + Duration::from_secs(25)), None);
    }

    #[test]
    fn test_status_transitions() {
        let mut health = FeedHealth::default();
        health.reset(Instant::now());

        assert_eq!(health.record_status(ConnectionStatus::Connected), None);
        assert_eq!(
            health.record_status(ConnectionStatus::Disconnected),
            Some(HealthTransition::Degraded(ConnectionStatus::Disconnected))
        );
        assert_eq!(health.record_status(ConnectionStatus::Disconnected), None);
        assert_eq!(health.record_status(ConnectionStatus::Connecting), None);
        assert_eq!(
            health.record_status(ConnectionStatus::Connected),
            Some(HealthTransition::Reconnected)
        );
        assert!(!health.is_degraded());
    }

    #[test]
    fn test_offline_notice_is_error() {
        let notice = HealthTransition::Degraded(ConnectionStatus::Offline)
            .notice(FeedHealth::DEFAULT_STALE_AFTER);
        assert_eq!(notice.level, crate::notice::NoticeLevel::Error);
        assert_eq!(notice.scope, NoticeScope::Feed);

        let stale = HealthTransition::Stale.notice(Duration::from_secs(45));
        assert!(stale.message.contains("45s"));
    }
}
