//! Foreground sync daemon.
//!
//! Wires the connectivity probe, the pass trigger, and the wake registrar
//! around one service, then waits for Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::cli::context::Context;
use crate::error::ShopsyncError;
use crate::sync::{
    register_best_effort, Connectivity, NoopRegistrar, SignalRegistrar, SyncEvent, SyncService,
    SyncTrigger, WakeRegistrar,
};

/// Run until interrupted.
///
/// `interval_override` replaces `trigger.sync_interval_secs`; zero disables
/// the timer.
///
/// # Errors
///
/// Returns an error if the queue or HTTP client cannot be set up.
pub async fn daemon(ctx: &Context, interval_override: Option<u64>) -> Result<String, ShopsyncError> {
    let probe = ctx.probe()?;
    let connectivity = Connectivity::new(probe.check().await);
    let service = Arc::new(ctx.service(connectivity.clone())?);

    let interval_secs = interval_override.unwrap_or(ctx.config.trigger.sync_interval_secs);
    let interval = (interval_secs > 0).then(|| Duration::from_secs(interval_secs));

    let shutdown = CancellationToken::new();
    let trigger = SyncTrigger::new(service.clone(), interval);

    let registrar: Box<dyn WakeRegistrar> = if ctx.config.trigger.wake_on_signal {
        Box::new(SignalRegistrar)
    } else {
        Box::new(NoopRegistrar)
    };
    register_best_effort(registrar.as_ref(), service.requester());

    let status = service.queue_status().await;
    tracing::info!(
        pending = status.pending,
        failed = status.failed,
        online = connectivity.is_online(),
        base_url = %ctx.config.api.base_url,
        "Sync daemon started"
    );

    let tasks = vec![
        tokio::spawn(trigger.run(shutdown.clone())),
        tokio::spawn(probe.run(connectivity.clone(), shutdown.clone())),
        tokio::spawn(log_events(service.clone(), shutdown.clone())),
    ];

    // Drain whatever survived the last run.
    service.request_pass();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down sync daemon");
    shutdown.cancel();

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("Daemon task failed: {e}");
        }
    }

    let status = service.queue_status().await;
    Ok(format!(
        "Stopped with {} pending and {} failed operation(s)",
        status.pending, status.failed
    ))
}

async fn log_events(service: Arc<SyncService>, shutdown: CancellationToken) {
    let mut events = service.subscribe();

    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(SyncEvent::Succeeded { id, kind, action, .. }) => {
                tracing::info!(%id, %kind, %action, "Synced");
            }
            Ok(SyncEvent::Failed { id, kind, action, error }) => {
                tracing::error!(%id, %kind, %action, "Gave up on operation: {error}");
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Event log fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
