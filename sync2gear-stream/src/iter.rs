//! Sync iterator for consuming feed events
//!
//! Provides a blocking iterator interface for processing feed events
//! without requiring async/await.

use std::sync::{mpsc, Arc};
use std::time::Duration;

use parking_lot::Mutex;

use crate::event::FeedEvent;

/// Blocking iterator over feed events
///
/// Blocks on `next()` until an event is available or the subscriber shuts
/// down. Use `try_recv()` for non-blocking access.
pub struct FeedIterator {
    rx: Arc<Mutex<mpsc::Receiver<FeedEvent>>>,
}

impl FeedIterator {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<FeedEvent>>>) -> Self {
        Self { rx }
    }

    /// Block until an event is available
    ///
    /// Returns `None` once the worker has shut down.
    pub fn recv(&self) -> Option<FeedEvent> {
        self.rx.lock().recv().ok()
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&self) -> Option<FeedEvent> {
        self.rx.lock().try_recv().ok()
    }

    /// Block until an event is available or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<FeedEvent> {
        self.rx.lock().recv_timeout(timeout).ok()
    }

    /// Non-blocking iterator over currently available events
    pub fn try_iter(&self) -> TryIterator<'_> {
        TryIterator { inner: self }
    }

    /// Blocking iterator that waits up to `timeout` for each event
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIterator<'_> {
        TimeoutIterator {
            inner: self,
            timeout,
        }
    }
}

impl Iterator for FeedIterator {
    type Item = FeedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl Clone for FeedIterator {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

pub struct TryIterator<'a> {
    inner: &'a FeedIterator,
}

impl<'a> Iterator for TryIterator<'a> {
    type Item = FeedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

pub struct TimeoutIterator<'a> {
    inner: &'a FeedIterator,
    timeout: Duration,
}

impl<'a> Iterator for TimeoutIterator<'a> {
    type Item = FeedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}
