//! Pass scheduling.
//!
//! Every trigger (enqueue, reconnect, timer, platform wake-up) funnels into
//! one pass request. Requests made while a pass runs coalesce into a single
//! follow-up pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::service::SyncService;

/// Cloneable handle that requests a pass.
#[derive(Debug, Clone, Default)]
pub struct PassRequester {
    notify: Arc<Notify>,
}

impl PassRequester {
    /// Create a requester with no pending request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a pass. Repeated requests before the next pass collapse
    /// into one.
    pub fn request(&self) {
        self.notify.notify_one();
    }

    /// Wait for a request.
    pub async fn requested(&self) {
        self.notify.notified().await;
    }
}

/// What woke the trigger loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Explicit request (enqueue, force, wake-up)
    Requested,
    /// Connectivity went from offline to online
    Reconnected,
    /// Periodic timer
    Timer,
}

/// Background loop that runs passes for a [`SyncService`].
pub struct SyncTrigger {
    service: Arc<SyncService>,
    interval: Option<Duration>,
    reconnects: watch::Receiver<u64>,
}

impl SyncTrigger {
    /// Create a trigger. `interval` of `None` disables the timer.
    ///
    /// Reconnects are counted from this point on, so one that lands before
    /// [`run`](Self::run) or while a pass is running still triggers a pass.
    #[must_use]
    pub fn new(service: Arc<SyncService>, interval: Option<Duration>) -> Self {
        let reconnects = service.connectivity().subscribe_reconnects();
        Self {
            service,
            interval,
            reconnects,
        }
    }

    /// Run until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        let requester = self.service.requester();
        let mut reconnects = self.reconnects;
        let mut ticker = self.interval.map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        tracing::info!(
            interval_secs = self.interval.map(|d| d.as_secs()),
            "Sync trigger started"
        );

        loop {
            let reason = tokio::select! {
                () = shutdown.cancelled() => break,
                () = requester.requested() => TriggerReason::Requested,
                changed = reconnects.changed() => match changed {
                    Ok(()) => TriggerReason::Reconnected,
                    Err(_) => break,
                },
                () = next_tick(ticker.as_mut()) => TriggerReason::Timer,
            };

            tracing::debug!(?reason, "Running sync pass");
            self.service.run_pass().await;
        }

        tracing::info!("Sync trigger stopped");
    }
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
