//! Operator-facing notifications
//!
//! Every failure the session catches ends up here as a dismissible `Notice`
//! scoped to the part of the pipeline it concerns.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::channel::{ChannelError, ChannelKind};

static NEXT_NOTICE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// The part of the pipeline a notice concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NoticeScope {
    Transport,
    Feed,
    Music,
    Announcement,
}

impl From<ChannelKind> for NoticeScope {
    fn from(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Music => NoticeScope::Music,
            ChannelKind::Announcement => NoticeScope::Announcement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub scope: NoticeScope,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, scope: NoticeScope, message: impl Into<String>) -> Self {
        Self {
            id: NEXT_NOTICE_ID.fetch_add(1, Ordering::Relaxed),
            level,
            scope,
            message: message.into(),
        }
    }

    pub fn info(scope: NoticeScope, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, scope, message)
    }

    pub fn warning(scope: NoticeScope, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, scope, message)
    }

    pub fn error(scope: NoticeScope, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, scope, message)
    }

    /// An audio output failed to load or play
    pub fn channel_failure(kind: ChannelKind, error: &ChannelError) -> Self {
        Self::error(kind.into(), format!("{} playback failed: {}", kind, error))
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}/{:?}] {}", self.level, self.scope, self.message)
    }
}

/// Destination for notices
pub trait NoticeSink {
    fn notify(&mut self, notice: Notice);
}

/// Keeps notices until they are dismissed
#[derive(Debug, Default)]
pub struct CollectingSink {
    notices: Vec<Notice>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices not yet dismissed, oldest first
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn in_scope(&self, scope: NoticeScope) -> impl Iterator<Item = &Notice> {
        self.notices.iter().filter(move |n| n.scope == scope)
    }

    /// Dismiss one notice, returning whether it was present
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

impl NoticeSink for CollectingSink {
    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NoticeSink for TracingSink {
    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => tracing::info!(scope = ?notice.scope, "{}", notice.message),
            NoticeLevel::Warning => tracing::warn!(scope = ?notice.scope, "{}", notice.message),
            NoticeLevel::Error => tracing::error!(scope = ?notice.scope, "{}", notice.message),
        }
    }
}

impl<S: NoticeSink + ?Sized> NoticeSink for Box<S> {
    fn notify(&mut self, notice: Notice) {
        (**self).notify(notice)
    }
}
