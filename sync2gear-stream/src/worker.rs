//! Background worker thread for the feed
//!
//! Spawns a thread with its own tokio runtime that owns the single live
//! connection while exposing a sync API to the parent `FeedSubscriber`.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle as TaskHandle;
use tokio_util::sync::CancellationToken;

use crate::config::FeedConfig;
use crate::connection::{run_feed, Emitter, FeedTarget, StatusCell};
use crate::event::FeedEvent;

/// How long a cancelled connection may take to close before it is abandoned
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Commands sent from the sync `FeedSubscriber` to the background worker
#[derive(Debug)]
pub(crate) enum Command {
    /// Replace the current connection with one for this target
    Select(FeedTarget),
    /// Close the current connection
    Clear,
    /// Shutdown the worker
    Shutdown,
}

struct ActiveFeed {
    zone_id: String,
    cancel: CancellationToken,
    handle: TaskHandle<()>,
}

/// Spawns the background feed worker thread
pub(crate) fn spawn_feed_worker(
    config: FeedConfig,
    command_rx: UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<FeedEvent>,
    status: StatusCell,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sync2gear-feed".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to create tokio runtime for feed worker: {}", e);
                    return;
                }
            };

            rt.block_on(run_worker(config, command_rx, event_tx, status));
        })
}

/// Main command loop running inside the tokio runtime
async fn run_worker(
    config: FeedConfig,
    mut command_rx: UnboundedReceiver<Command>,
    event_tx: mpsc::Sender<FeedEvent>,
    status: StatusCell,
) {
    let mut active: Option<ActiveFeed> = None;

    tracing::info!("Feed worker started");

    while let Some(command) = command_rx.recv().await {
        match command {
            Command::Select(target) => {
                // The previous zone's connection is closed before the next one opens.
                stop(&mut active).await;

                tracing::debug!(
                    "Worker: selecting zone {} (generation {})",
                    target.zone_id,
                    target.generation
                );
                let cancel = CancellationToken::new();
                let emitter = Emitter::new(&target, event_tx.clone(), status.clone(), cancel.clone());
                let zone_id = target.zone_id.clone();
                let handle = tokio::spawn(run_feed(target, config.clone(), emitter, cancel.clone()));

                active = Some(ActiveFeed {
                    zone_id,
                    cancel,
                    handle,
                });
            }
            Command::Clear => stop(&mut active).await,
            Command::Shutdown => {
                tracing::info!("Worker received shutdown command");
                break;
            }
        }
    }

    stop(&mut active).await;
    tracing::info!("Feed worker shut down");
}

async fn stop(active: &mut Option<ActiveFeed>) {
    let Some(feed) = active.take() else {
        return;
    };

    tracing::debug!("Worker: closing feed for zone {}", feed.zone_id);
    feed.cancel.cancel();

    let mut handle = feed.handle;
    if tokio::time::timeout(STOP_GRACE, &mut handle).await.is_err() {
        tracing::warn!("Feed for zone {} did not close in time, aborting", feed.zone_id);
        handle.abort();
    }
}
