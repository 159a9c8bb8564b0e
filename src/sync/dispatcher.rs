//! Queue dispatcher.
//!
//! Drains the queue in priority order, hands each operation to its handler,
//! and does the retry bookkeeping. At most one pass runs at a time.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use colored::Colorize;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::connectivity::Connectivity;
use super::handler::HandlerRegistry;
use super::operation::{Action, Operation, OperationKind};
use super::persisted::PersistedQueue;
use crate::config::QueueConfig;

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Attempts allowed for newly queued operations
    pub max_attempts: u32,
    /// Pause between two handler invocations in one pass
    pub inter_operation_delay: Duration,
    /// Backoff after the first failure; zero disables backoff
    pub backoff_base: chrono::Duration,
    /// Backoff ceiling
    pub backoff_max: chrono::Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for DispatcherConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            inter_operation_delay: Duration::from_millis(config.inter_operation_delay_ms),
            backoff_base: secs(config.backoff_base_secs),
            backoff_max: secs(config.backoff_max_secs),
        }
    }
}

fn secs(value: u64) -> chrono::Duration {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

/// Notification published after each handler outcome that ends an
/// operation's life in the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// The handler succeeded; the operation was dequeued.
    Succeeded {
        id: Uuid,
        kind: OperationKind,
        action: Action,
        result: serde_json::Value,
    },
    /// The operation exhausted its attempts.
    Failed {
        id: Uuid,
        kind: OperationKind,
        action: Action,
        error: String,
    },
}

/// Outcome for one operation within a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Handler succeeded
    Succeeded,
    /// Handler failed; attempts remain
    Retrying,
    /// Handler failed and the attempt budget is spent
    Exhausted,
    /// Already failed before the pass
    Skipped,
    /// Still inside its backoff window
    Deferred,
}

/// Result of one operation within a pass.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Operation ID
    pub id: Uuid,
    /// Operation kind
    pub kind: OperationKind,
    /// Operation action
    pub action: Action,
    /// What happened
    pub outcome: Outcome,
    /// Error message if the handler failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    fn new(operation: &Operation, outcome: Outcome, error: Option<String>) -> Self {
        Self {
            id: operation.id,
            kind: operation.kind(),
            action: operation.action,
            outcome,
            error,
        }
    }
}

/// Summary of a completed pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PassReport {
    /// Operations delivered and dequeued
    pub succeeded: usize,
    /// Failures with attempts remaining
    pub retrying: usize,
    /// Failures that spent the last attempt
    pub exhausted: usize,
    /// Failed operations left untouched
    pub skipped: usize,
    /// Operations waiting out their backoff
    pub deferred: usize,
    /// Individual results
    pub results: Vec<ExecutionResult>,
}

impl PassReport {
    /// Add a result.
    pub fn add(&mut self, result: ExecutionResult) {
        match result.outcome {
            Outcome::Succeeded => self.succeeded += 1,
            Outcome::Retrying => self.retrying += 1,
            Outcome::Exhausted => self.exhausted += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Deferred => self.deferred += 1,
        }
        self.results.push(result);
    }

    /// Handler invocations made during the pass.
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.succeeded + self.retrying + self.exhausted
    }
}

/// Why a pass did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Not connected
    Offline,
    /// Nothing queued
    Empty,
    /// Another pass is in progress
    AlreadyProcessing,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Offline => "offline",
            Self::Empty => "queue is empty",
            Self::AlreadyProcessing => "a pass is already running",
        };
        write!(f, "{text}")
    }
}

/// Result of requesting a pass.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PassOutcome {
    /// The guard rejected the pass.
    Skipped { reason: SkipReason },
    /// The pass ran to completion.
    Completed(PassReport),
}

impl PassOutcome {
    /// The report, if the pass ran.
    #[must_use]
    pub const fn report(&self) -> Option<&PassReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped { .. } => None,
        }
    }
}

/// Clears the processing flag when a pass ends, including on cancellation.
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs passes over a [`PersistedQueue`].
pub struct Dispatcher {
    queue: Arc<PersistedQueue>,
    handlers: HandlerRegistry,
    connectivity: Connectivity,
    events: broadcast::Sender<SyncEvent>,
    config: DispatcherConfig,
    processing: AtomicBool,
    passes: AtomicU64,
}

impl Dispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(
        queue: Arc<PersistedQueue>,
        handlers: HandlerRegistry,
        connectivity: Connectivity,
        events: broadcast::Sender<SyncEvent>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            queue,
            handlers,
            connectivity,
            events,
            config,
            processing: AtomicBool::new(false),
            passes: AtomicU64::new(0),
        }
    }

    /// Whether a pass is in progress.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Number of passes that ran to completion.
    #[must_use]
    pub fn passes_completed(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Settings in use.
    #[must_use]
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Run one pass if connected, non-empty, and idle.
    pub async fn run_pass(&self) -> PassOutcome {
        if !self.connectivity.is_online() {
            tracing::debug!("Skipping sync pass: offline");
            return PassOutcome::Skipped {
                reason: SkipReason::Offline,
            };
        }

        if self.queue.read(|q| q.is_empty()).await {
            return PassOutcome::Skipped {
                reason: SkipReason::Empty,
            };
        }

        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Skipping sync pass: already processing");
            return PassOutcome::Skipped {
                reason: SkipReason::AlreadyProcessing,
            };
        }
        let _guard = ProcessingGuard(&self.processing);

        let report = self.drain().await;
        self.passes.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            succeeded = report.succeeded,
            retrying = report.retrying,
            exhausted = report.exhausted,
            skipped = report.skipped,
            deferred = report.deferred,
            "Sync pass completed"
        );

        PassOutcome::Completed(report)
    }

    async fn drain(&self) -> PassReport {
        // Operations queued after this point wait for the next pass.
        let snapshot = self.queue.read(|q| q.ids()).await;
        let mut completed = HashSet::new();
        let mut report = PassReport::default();
        let mut first = true;

        for id in snapshot {
            let Some(operation) = self.queue.read(|q| q.get(id).cloned()).await else {
                // Removed by the host mid-pass.
                continue;
            };

            if operation.is_failed() {
                report.add(ExecutionResult::new(&operation, Outcome::Skipped, None));
                continue;
            }

            if !operation.is_due(Utc::now(), self.config.backoff_base, self.config.backoff_max) {
                report.add(ExecutionResult::new(&operation, Outcome::Deferred, None));
                continue;
            }

            if !first && !self.config.inter_operation_delay.is_zero() {
                tokio::time::sleep(self.config.inter_operation_delay).await;
            }
            first = false;

            let result = self.execute_one(&operation, &mut completed).await;
            report.add(result);
        }

        // Success only counts once the removal is saved.
        self.queue
            .mutate(|q| {
                q.remove_all(&completed);
            })
            .await;

        report
    }

    async fn execute_one(&self, operation: &Operation, completed: &mut HashSet<Uuid>) -> ExecutionResult {
        let kind = operation.kind();
        tracing::debug!(id = %operation.id, %kind, action = %operation.action, "Dispatching operation");

        match self.handlers.dispatch(operation.action, &operation.payload).await {
            Ok(result) => {
                completed.insert(operation.id);
                self.emit(SyncEvent::Succeeded {
                    id: operation.id,
                    kind,
                    action: operation.action,
                    result,
                });
                ExecutionResult::new(operation, Outcome::Succeeded, None)
            }
            Err(error) => {
                let now = Utc::now();
                let message = error.message.clone();
                let transient = error.is_transient();

                let updated = self
                    .queue
                    .mutate_unsaved(|q| {
                        q.get_mut(operation.id).map(|op| {
                            if transient {
                                op.record_failure(&message, now);
                            } else {
                                op.record_permanent_failure(&message, now);
                            }
                            (op.attempts, op.is_failed())
                        })
                    })
                    .await;

                let Some((attempts, exhausted)) = updated else {
                    return ExecutionResult::new(operation, Outcome::Retrying, Some(message));
                };

                if exhausted {
                    tracing::warn!(
                        id = %operation.id,
                        %kind,
                        attempts,
                        "Operation failed permanently: {message}"
                    );
                    self.emit(SyncEvent::Failed {
                        id: operation.id,
                        kind,
                        action: operation.action,
                        error: message.clone(),
                    });
                    ExecutionResult::new(operation, Outcome::Exhausted, Some(message))
                } else {
                    tracing::debug!(
                        id = %operation.id,
                        %kind,
                        attempts,
                        max_attempts = operation.max_attempts,
                        "Operation failed, will retry: {message}"
                    );
                    ExecutionResult::new(operation, Outcome::Retrying, Some(message))
                }
            }
        }
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Format a pass outcome for display.
#[must_use]
pub fn format_pass_outcome(outcome: &PassOutcome) -> String {
    let report = match outcome {
        PassOutcome::Skipped { reason } => {
            return format!("{} Sync skipped: {reason}", "○".yellow());
        }
        PassOutcome::Completed(report) => report,
    };

    let mut lines = Vec::new();
    lines.push(format!("Sync completed: {} operations attempted", report.attempted()));
    lines.push("─".repeat(40));

    if report.succeeded > 0 {
        lines.push(format!(
            "  {} {}",
            "✓".green(),
            format!("{} succeeded", report.succeeded).green()
        ));
    }

    if report.retrying > 0 {
        lines.push(format!(
            "  {} {}",
            "↻".yellow(),
            format!("{} will retry", report.retrying).yellow()
        ));
    }

    if report.exhausted > 0 {
        lines.push(format!(
            "  {} {}",
            "✗".red(),
            format!("{} failed permanently", report.exhausted).red()
        ));
    }

    if report.deferred > 0 {
        lines.push(format!(
            "  {} {}",
            "…".dimmed(),
            format!("{} waiting for backoff", report.deferred).dimmed()
        ));
    }

    if report.skipped > 0 {
        lines.push(format!(
            "  {} {}",
            "○".yellow(),
            format!("{} already failed", report.skipped).yellow()
        ));
    }

    let errors: Vec<_> = report
        .results
        .iter()
        .filter_map(|r| r.error.as_deref().map(|e| (r, e)))
        .take(3)
        .collect();

    if !errors.is_empty() {
        lines.push(String::new());
        lines.push("Errors:".to_string());
        for (result, error) in errors {
            lines.push(format!("  - {} {}: {error}", result.action, result.kind));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::storage::MemoryKeyValueStore;
    use crate::sync::handler::{Handler, HandlerError};
    use crate::sync::operation::{DevicePayload, Payload, Priority};
    use crate::sync::store::DurableStore;

    /// Records every call; fails while `failures` is non-zero.
    #[derive(Default)]
    struct Scripted {
        calls: Mutex<Vec<String>>,
        failures: Mutex<Vec<HandlerError>>,
    }

    impl Scripted {
        fn failing(errors: Vec<HandlerError>) -> Self {
            Self {
                calls: Mutex::default(),
                failures: Mutex::new(errors),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Handler for Scripted {
        async fn handle(
            &self,
            _action: Action,
            payload: &Payload,
        ) -> Result<serde_json::Value, HandlerError> {
            let Payload::Device(device) = payload else {
                panic!("unexpected payload");
            };
            self.calls.lock().unwrap().push(device.serial_number.clone());
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                Ok(serde_json::json!({"ok": true}))
            } else {
                Err(failures.remove(0))
            }
        }
    }

    fn device(serial: &str) -> Payload {
        Payload::Device(DevicePayload {
            id: None,
            serial_number: serial.to_string(),
            model: "Galaxy S23".to_string(),
            customer_id: None,
            status: None,
        })
    }

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            max_attempts: 3,
            inter_operation_delay: Duration::ZERO,
            backoff_base: chrono::Duration::zero(),
            backoff_max: chrono::Duration::zero(),
        }
    }

    struct Fixture {
        queue: Arc<PersistedQueue>,
        handler: Arc<Scripted>,
        dispatcher: Dispatcher,
        events: broadcast::Receiver<SyncEvent>,
        connectivity: Connectivity,
    }

    fn fixture(handler: Scripted, config: DispatcherConfig) -> Fixture {
        let store = DurableStore::new(Arc::new(MemoryKeyValueStore::new()));
        let queue = Arc::new(PersistedQueue::load(store));
        let handler = Arc::new(handler);
        let connectivity = Connectivity::online();
        let (tx, events) = broadcast::channel(16);
        let dispatcher = Dispatcher::new(
            queue.clone(),
            HandlerRegistry::uniform(handler.clone()),
            connectivity.clone(),
            tx,
            config,
        );
        Fixture {
            queue,
            handler,
            dispatcher,
            events,
            connectivity,
        }
    }

    async fn enqueue(queue: &PersistedQueue, serial: &str, priority: Priority, max_attempts: u32) -> Uuid {
        queue
            .mutate(|q| q.enqueue(device(serial), Action::Create, priority, max_attempts))
            .await
    }

    #[tokio::test]
    async fn test_pass_processes_in_priority_order() {
        let f = fixture(Scripted::default(), config());
        enqueue(&f.queue, "low", Priority::Low, 3).await;
        enqueue(&f.queue, "high", Priority::High, 3).await;
        enqueue(&f.queue, "medium", Priority::Medium, 3).await;

        let outcome = f.dispatcher.run_pass().await;

        assert_eq!(f.handler.calls(), vec!["high", "medium", "low"]);
        assert_eq!(outcome.report().unwrap().succeeded, 3);
        assert!(f.queue.read(|q| q.is_empty()).await);
        assert!(!f.dispatcher.is_processing());
    }

    #[tokio::test]
    async fn test_transient_failure_keeps_operation() {
        let f = fixture(Scripted::failing(vec![HandlerError::transient("timeout")]), config());
        let id = enqueue(&f.queue, "a", Priority::High, 3).await;

        let outcome = f.dispatcher.run_pass().await;

        let report = outcome.report().unwrap();
        assert_eq!(report.retrying, 1);
        let op = f.queue.read(|q| q.get(id).cloned()).await.unwrap();
        assert_eq!(op.attempts, 1);
        assert_eq!(op.last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_permanent_failure_exhausts_and_emits() {
        let mut f = fixture(Scripted::failing(vec![HandlerError::permanent("422")]), config());
        let id = enqueue(&f.queue, "a", Priority::High, 5).await;

        let outcome = f.dispatcher.run_pass().await;

        assert_eq!(outcome.report().unwrap().exhausted, 1);
        let op = f.queue.read(|q| q.get(id).cloned()).await.unwrap();
        assert!(op.is_failed());
        match f.events.try_recv().unwrap() {
            SyncEvent::Failed { id: event_id, error, .. } => {
                assert_eq!(event_id, id);
                assert_eq!(error, "422");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_operations_are_skipped() {
        let f = fixture(Scripted::failing(vec![HandlerError::transient("boom")]), config());
        let id = enqueue(&f.queue, "a", Priority::High, 1).await;

        f.dispatcher.run_pass().await;
        let outcome = f.dispatcher.run_pass().await;

        assert_eq!(f.handler.calls().len(), 1);
        assert_eq!(outcome.report().unwrap().skipped, 1);
        assert!(f.queue.read(|q| q.get(id).is_some()).await);
    }

    #[tokio::test]
    async fn test_backoff_defers_retry() {
        let mut cfg = config();
        cfg.backoff_base = chrono::Duration::hours(1);
        cfg.backoff_max = chrono::Duration::hours(1);
        let f = fixture(Scripted::failing(vec![HandlerError::transient("503")]), cfg);
        enqueue(&f.queue, "a", Priority::High, 3).await;

        f.dispatcher.run_pass().await;
        let outcome = f.dispatcher.run_pass().await;

        assert_eq!(f.handler.calls().len(), 1);
        assert_eq!(outcome.report().unwrap().deferred, 1);
    }

    #[tokio::test]
    async fn test_guard_rejects_offline_and_empty() {
        let f = fixture(Scripted::default(), config());

        assert!(matches!(
            f.dispatcher.run_pass().await,
            PassOutcome::Skipped { reason: SkipReason::Empty }
        ));

        enqueue(&f.queue, "a", Priority::High, 3).await;
        f.connectivity.set_online(false);
        assert!(matches!(
            f.dispatcher.run_pass().await,
            PassOutcome::Skipped { reason: SkipReason::Offline }
        ));
        assert!(f.handler.calls().is_empty());
        assert_eq!(f.dispatcher.passes_completed(), 0);
    }

    #[tokio::test]
    async fn test_success_emits_event_with_result() {
        let mut f = fixture(Scripted::default(), config());
        let id = enqueue(&f.queue, "a", Priority::Medium, 3).await;

        f.dispatcher.run_pass().await;

        match f.events.try_recv().unwrap() {
            SyncEvent::Succeeded { id: event_id, kind, result, .. } => {
                assert_eq!(event_id, id);
                assert_eq!(kind, OperationKind::Device);
                assert_eq!(result["ok"], true);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_format_pass_outcome() {
        let skipped = format_pass_outcome(&PassOutcome::Skipped {
            reason: SkipReason::Offline,
        });
        assert!(skipped.contains("offline"));

        let mut report = PassReport::default();
        report.add(ExecutionResult {
            id: Uuid::new_v4(),
            kind: OperationKind::Backup,
            action: Action::Create,
            outcome: Outcome::Retrying,
            error: Some("503".to_string()),
        });
        let text = format_pass_outcome(&PassOutcome::Completed(report));
        assert!(text.contains("1 will retry"));
        assert!(text.contains("create backup: 503"));
    }
}
