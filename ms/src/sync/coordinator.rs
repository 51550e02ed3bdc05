//! SyncCoordinator - polling fallback for the push transport
//!
//! Watches the transport's connection status. While the transport is down
//! the coordinator refetches the conversation list and the active
//! conversation's messages on a fixed timer; when the transport comes
//! back it cancels the timer and forces one immediate refetch. Push
//! delivery and polling are never active at the same time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::transport::ConnectionStatus;

use super::handler::SyncHandler;

/// Observable coordinator state, published for display consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSnapshot {
    /// Whether the polling fallback is currently armed
    pub is_polling: bool,
    /// Connection status passthrough
    pub connection: ConnectionStatus,
}

/// Polling fallback coordinator
///
/// Owns at most one live interval at any time: arming while armed
/// replaces (and thereby cancels) the previous one, teardown drops it.
/// Refetch failures are logged and swallowed; the fixed interval is the
/// retry mechanism.
pub struct SyncCoordinator {
    /// Connection status from the transport
    status_rx: watch::Receiver<ConnectionStatus>,
    /// Active conversation selection; changes do not disturb the timer
    active_rx: watch::Receiver<Option<String>>,
    /// Refetch seam
    handler: Arc<dyn SyncHandler>,
    /// Tick period while polling
    poll_interval: Duration,
    /// Published observable state
    snapshot_tx: watch::Sender<SyncSnapshot>,
}

impl SyncCoordinator {
    /// Create a coordinator and the receiver for its observable state
    pub fn new(
        status_rx: watch::Receiver<ConnectionStatus>,
        active_rx: watch::Receiver<Option<String>>,
        handler: Arc<dyn SyncHandler>,
        poll_interval: Duration,
    ) -> (Self, watch::Receiver<SyncSnapshot>) {
        let initial = SyncSnapshot {
            is_polling: false,
            connection: *status_rx.borrow(),
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let coordinator = Self {
            status_rx,
            active_rx,
            handler,
            poll_interval,
            snapshot_tx,
        };
        (coordinator, snapshot_rx)
    }

    /// Run until a shutdown signal arrives or the status channel closes
    ///
    /// Dropping the interval is the only cancellation: refetches already
    /// in flight resolve on their own and are simply not rescheduled.
    pub async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(interval_ms = self.poll_interval.as_millis() as u64, "SyncCoordinator starting");

        let mut poll: Option<Interval> = None;

        // The transport may already be down at startup
        let status = *self.status_rx.borrow_and_update();
        if status.needs_polling() {
            poll = Some(self.arm_interval());
        }
        self.publish(status, poll.is_some());

        loop {
            tokio::select! {
                changed = self.status_rx.changed() => {
                    if changed.is_err() {
                        warn!("run: status channel closed, stopping");
                        break;
                    }
                    let status = *self.status_rx.borrow_and_update();
                    self.on_status_change(status, &mut poll).await;
                }
                _ = next_tick(&mut poll) => {
                    self.poll_tick().await;
                }
                _ = shutdown_rx.recv() => {
                    debug!("run: shutdown signal received");
                    break;
                }
            }
        }

        drop(poll);
        info!("SyncCoordinator stopped");
    }

    /// React to a connection status change
    async fn on_status_change(&mut self, status: ConnectionStatus, poll: &mut Option<Interval>) {
        debug!(%status, was_polling = poll.is_some(), "on_status_change");

        if status.needs_polling() {
            // Idempotent restart: replacing the interval cancels any
            // previous one, so at most one timer is ever live.
            *poll = Some(self.arm_interval());
            self.publish(status, true);
            return;
        }

        if poll.take().is_some() {
            debug!("on_status_change: polling stopped");
        }
        self.publish(status, false);

        if status.is_connected() {
            info!("Transport connected, forcing immediate refetch");
            self.refetch_all().await;
        }
    }

    /// One poll tick: refresh both targets
    async fn poll_tick(&self) {
        debug!("poll_tick: refreshing cached data");
        self.refetch_all().await;
    }

    /// Refetch the conversation list, then the active conversation's
    /// messages. Sequential, best-effort: a failure on either target is
    /// logged and never stops the other or the loop.
    async fn refetch_all(&self) {
        if let Err(e) = self.handler.refetch_conversations().await {
            warn!(error = %e, "Conversation list refetch failed");
        }

        let active = self.active_rx.borrow().clone();
        if let Some(conversation_id) = active {
            if let Err(e) = self.handler.refetch_messages(&conversation_id).await {
                warn!(error = %e, %conversation_id, "Message refetch failed");
            }
        }
    }

    /// Arm a fresh interval whose first tick is one full period away
    fn arm_interval(&self) -> Interval {
        debug!(interval_ms = self.poll_interval.as_millis() as u64, "arm_interval");
        let mut interval = tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        // Never burst to catch up after a long refetch
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    fn publish(&self, connection: ConnectionStatus, is_polling: bool) {
        self.snapshot_tx.send_replace(SyncSnapshot { is_polling, connection });
    }
}

/// Resolve on the next poll tick, or never while polling is off
async fn next_tick(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
