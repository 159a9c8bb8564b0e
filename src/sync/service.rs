//! Public face of the sync queue.
//!
//! Hosts record work with the `sync_*` calls and never wait for the remote
//! side. Everything else (ordering, retries, persistence, triggers) happens
//! behind this type.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::connectivity::Connectivity;
use super::dispatcher::{Dispatcher, DispatcherConfig, PassOutcome, SyncEvent};
use super::handler::HandlerRegistry;
use super::operation::{
    Action, BackupPayload, DevicePayload, DiagnosticPayload, Operation, Payload, Priority,
    ReportPayload,
};
use super::persisted::PersistedQueue;
use super::store::DurableStore;
use super::trigger::PassRequester;

const EVENT_CAPACITY: usize = 256;

/// Snapshot of the queue for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    /// Operations in the queue
    pub total: usize,
    /// Operations with attempts remaining
    pub pending: usize,
    /// Operations that exhausted their attempts
    pub failed: usize,
    /// Whether a pass is running
    pub is_processing: bool,
    /// Saves that failed since startup
    pub persist_failures: u64,
}

/// Offline-first sync queue.
pub struct SyncService {
    queue: Arc<PersistedQueue>,
    dispatcher: Dispatcher,
    connectivity: Connectivity,
    requester: PassRequester,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncService {
    /// Restore the queue from `store` and wire up the dispatcher.
    #[must_use]
    pub fn new(
        store: DurableStore,
        handlers: HandlerRegistry,
        connectivity: Connectivity,
        config: DispatcherConfig,
    ) -> Self {
        let queue = Arc::new(PersistedQueue::load(store));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let dispatcher = Dispatcher::new(
            queue.clone(),
            handlers,
            connectivity.clone(),
            events.clone(),
            config,
        );

        Self {
            queue,
            dispatcher,
            connectivity,
            requester: PassRequester::new(),
            events,
        }
    }

    /// Queue a diagnostic.
    pub async fn sync_diagnostic(
        &self,
        action: Action,
        data: DiagnosticPayload,
        priority: Option<Priority>,
    ) -> Uuid {
        self.enqueue(Payload::Diagnostic(data), action, priority).await
    }

    /// Queue a device record.
    pub async fn sync_device(
        &self,
        action: Action,
        data: DevicePayload,
        priority: Option<Priority>,
    ) -> Uuid {
        self.enqueue(Payload::Device(data), action, priority).await
    }

    /// Queue a new backup record.
    pub async fn sync_backup(&self, data: BackupPayload, priority: Option<Priority>) -> Uuid {
        self.enqueue(Payload::Backup(data), Action::Create, priority).await
    }

    /// Queue a new report.
    pub async fn sync_report(&self, data: ReportPayload, priority: Option<Priority>) -> Uuid {
        self.enqueue(Payload::Report(data), Action::Create, priority).await
    }

    /// Queue any payload. Without an explicit priority the kind's default
    /// is used. Requests a pass when online.
    pub async fn enqueue(&self, payload: Payload, action: Action, priority: Option<Priority>) -> Uuid {
        let kind = payload.kind();
        let priority = priority.unwrap_or_else(|| kind.default_priority());
        let max_attempts = self.dispatcher.config().max_attempts;

        let id = self
            .queue
            .mutate(|q| q.enqueue(payload, action, priority, max_attempts))
            .await;

        tracing::debug!(%id, %kind, %action, %priority, "Queued operation");

        if self.connectivity.is_online() {
            self.requester.request();
        }
        id
    }

    /// Counts plus processing state.
    pub async fn queue_status(&self) -> QueueStatus {
        let counts = self.queue.read(|q| q.status()).await;
        QueueStatus {
            total: counts.total,
            pending: counts.pending,
            failed: counts.failed,
            is_processing: self.dispatcher.is_processing(),
            persist_failures: self.queue.save_failures(),
        }
    }

    /// Queued operations in processing order.
    pub async fn operations(&self) -> Vec<Operation> {
        self.queue.read(|q| q.as_slice().to_vec()).await
    }

    /// Look up one operation.
    pub async fn operation(&self, id: Uuid) -> Option<Operation> {
        self.queue.read(|q| q.get(id).cloned()).await
    }

    /// Run a pass now. No-op when offline, empty, or already running.
    pub async fn force_sync(&self) -> PassOutcome {
        self.run_pass().await
    }

    /// Run a pass through the dispatcher guard.
    pub async fn run_pass(&self) -> PassOutcome {
        self.dispatcher.run_pass().await
    }

    /// Drop every operation that exhausted its attempts. Returns how many.
    pub async fn clear_failed_items(&self) -> usize {
        let removed = self.queue.mutate(|q| q.purge_failed()).await;
        if removed > 0 {
            tracing::info!(removed, "Cleared failed operations");
        }
        removed
    }

    /// Give failed operations a fresh attempt budget. Returns how many.
    pub async fn retry_failed(&self) -> usize {
        let reset = self.queue.mutate(|q| q.reset_failed()).await;
        if reset > 0 {
            tracing::info!(reset, "Reset failed operations");
            if self.connectivity.is_online() {
                self.requester.request();
            }
        }
        reset
    }

    /// Remove one operation. Returns whether it was queued.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.queue.mutate(|q| q.remove(id)).await
    }

    /// Receive success and permanent-failure events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Connectivity observer in use.
    #[must_use]
    pub const fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Handle for requesting passes from other tasks.
    #[must_use]
    pub fn requester(&self) -> PassRequester {
        self.requester.clone()
    }

    /// Request a pass from the trigger loop.
    pub fn request_pass(&self) {
        self.requester.request();
    }

    /// Number of passes that ran to completion.
    #[must_use]
    pub fn passes_completed(&self) -> u64 {
        self.dispatcher.passes_completed()
    }
}
