//! Offline sync queue.
//!
//! Records remote mutations while the console is offline and replays them
//! in priority order once connectivity returns.
//!
//! Features:
//! - Four operation kinds (diagnostic, device, backup, report)
//! - Priority ordering with FIFO among equals
//! - Bounded retries with exponential backoff
//! - Snapshot persistence that survives restarts
//! - Reconnect, timer, and platform wake-up triggers

pub mod connectivity;
pub mod dispatcher;
pub mod handler;
pub mod http;
pub mod operation;
pub mod persisted;
pub mod queue;
pub mod registrar;
pub mod service;
pub mod store;
pub mod trigger;

pub use connectivity::{Connectivity, ConnectivityProbe};
pub use dispatcher::{
    format_pass_outcome, Dispatcher, DispatcherConfig, PassOutcome, PassReport, SkipReason,
    SyncEvent,
};
pub use handler::{FailureClass, Handler, HandlerError, HandlerRegistry};
pub use http::HttpHandler;
pub use operation::{
    Action, BackupPayload, DevicePayload, DiagnosticPayload, Operation, OperationKind, Payload,
    Priority, ReportPayload,
};
pub use queue::{OperationQueue, QueueCounts};
pub use registrar::{
    register_best_effort, NoopRegistrar, RegistrarError, SignalRegistrar, WakeRegistrar,
};
pub use service::{QueueStatus, SyncService};
pub use store::DurableStore;
pub use trigger::{PassRequester, SyncTrigger};
