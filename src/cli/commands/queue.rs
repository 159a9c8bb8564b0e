//! Queue management commands.

use colored::Colorize;
use serde_json::json;
use uuid::Uuid;

use crate::cli::args::OutputFormat;
use crate::cli::context::Context;
use crate::error::ShopsyncError;
use crate::output::{format_enqueued, format_operations, format_pass, format_status, to_json};
use crate::sync::{Action, Connectivity, OperationKind, Payload, Priority};

/// Show queue status.
///
/// # Errors
///
/// Returns an error if the queue cannot be opened or output formatting fails.
pub async fn status(ctx: &Context, check: bool, format: OutputFormat) -> Result<String, ShopsyncError> {
    let online = if check {
        Some(ctx.probe()?.check().await)
    } else {
        None
    };

    let service = ctx.service(Connectivity::offline())?;
    let status = service.queue_status().await;
    format_status(&status, online, format)
}

/// List queued operations.
///
/// # Errors
///
/// Returns an error if the queue cannot be opened or output formatting fails.
pub async fn list(
    ctx: &Context,
    failed_only: bool,
    limit: usize,
    format: OutputFormat,
) -> Result<String, ShopsyncError> {
    let service = ctx.service(Connectivity::offline())?;
    let operations: Vec<_> = service
        .operations()
        .await
        .into_iter()
        .filter(|op| !failed_only || op.is_failed())
        .take(limit)
        .collect();

    let title = if failed_only { "Failed operations" } else { "Queued operations" };
    format_operations(&operations, title, format)
}

/// Queue an operation from JSON data.
///
/// # Errors
///
/// Returns `ShopsyncError::Parse` if the data does not fit the kind, or an
/// error if the queue cannot be opened.
pub async fn enqueue(
    ctx: &Context,
    kind: OperationKind,
    action: Action,
    data: &str,
    priority: Option<Priority>,
    format: OutputFormat,
) -> Result<String, ShopsyncError> {
    let payload = parse_payload(kind, action, data)?;

    let service = ctx.service(Connectivity::offline())?;
    let id = service.enqueue(payload, action, priority).await;
    let operation = service
        .operation(id)
        .await
        .ok_or_else(|| ShopsyncError::NotFound(format!("Operation {id}")))?;

    format_enqueued(&operation, format)
}

/// Remove one operation.
///
/// # Errors
///
/// Returns `ShopsyncError::NotFound` if the operation is not queued.
pub async fn remove(ctx: &Context, id: Uuid, format: OutputFormat) -> Result<String, ShopsyncError> {
    let service = ctx.service(Connectivity::offline())?;
    if !service.remove(id).await {
        return Err(ShopsyncError::NotFound(format!("Operation {id}")));
    }

    match format {
        OutputFormat::Json => to_json(&json!({ "removed": id })),
        OutputFormat::Pretty => Ok(format!("{} Removed {id}", "✓".green())),
    }
}

/// Probe the API and run one pass.
///
/// # Errors
///
/// Returns an error if the queue cannot be opened or output formatting fails.
pub async fn run(ctx: &Context, format: OutputFormat) -> Result<String, ShopsyncError> {
    let online = ctx.probe()?.check().await;
    let service = ctx.service(Connectivity::new(online))?;
    let outcome = service.force_sync().await;
    format_pass(&outcome, format)
}

/// Reset failed operations.
///
/// # Errors
///
/// Returns an error if the queue cannot be opened or output formatting fails.
pub async fn retry(ctx: &Context, format: OutputFormat) -> Result<String, ShopsyncError> {
    let service = ctx.service(Connectivity::offline())?;
    let reset = service.retry_failed().await;

    match format {
        OutputFormat::Json => to_json(&json!({ "reset": reset })),
        OutputFormat::Pretty if reset == 0 => Ok("No failed operations to retry.".to_string()),
        OutputFormat::Pretty => Ok(format!(
            "{} Reset {reset} failed operation(s); they will sync on the next pass",
            "✓".green()
        )),
    }
}

/// Drop failed operations.
///
/// # Errors
///
/// Returns an error if the queue cannot be opened or output formatting fails.
pub async fn clear_failed(ctx: &Context, format: OutputFormat) -> Result<String, ShopsyncError> {
    let service = ctx.service(Connectivity::offline())?;
    let removed = service.clear_failed_items().await;

    match format {
        OutputFormat::Json => to_json(&json!({ "removed": removed })),
        OutputFormat::Pretty if removed == 0 => Ok("No failed operations to clear.".to_string()),
        OutputFormat::Pretty => Ok(format!(
            "{} Cleared {removed} failed operation(s)",
            "✓".green()
        )),
    }
}

/// Parse `--data` into a typed payload. `@path` reads the JSON from a file.
fn parse_payload(kind: OperationKind, action: Action, data: &str) -> Result<Payload, ShopsyncError> {
    let raw = match data.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => data.to_string(),
    };

    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let payload = Payload::from_json(kind, value)
        .map_err(|e| ShopsyncError::Parse(format!("Invalid {kind} data: {e}")))?;

    if action.requires_remote_id() && payload.remote_id().is_none() {
        return Err(ShopsyncError::Parse(format!(
            "{action} {kind} requires the remote \"id\" in --data"
        )));
    }

    Ok(payload)
}
