//! Output formatting for shopsync.
//!
//! This module provides formatters for displaying queue state in various formats.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::error::ShopsyncError;
use crate::sync::{format_pass_outcome, Operation, PassOutcome, QueueStatus};

pub use json::*;
pub use pretty::*;

/// Format queue status based on output format
///
/// # Errors
///
/// Returns `ShopsyncError::Parse` if JSON serialization fails.
pub fn format_status(
    status: &QueueStatus,
    online: Option<bool>,
    format: OutputFormat,
) -> Result<String, ShopsyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_status_pretty(status, online)),
        OutputFormat::Json => format_status_json(status, online),
    }
}

/// Format operations based on output format
///
/// # Errors
///
/// Returns `ShopsyncError::Parse` if JSON serialization fails.
pub fn format_operations(
    operations: &[Operation],
    title: &str,
    format: OutputFormat,
) -> Result<String, ShopsyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_operations_pretty(operations, title)),
        OutputFormat::Json => format_operations_json(operations),
    }
}

/// Format a newly queued operation based on output format
///
/// # Errors
///
/// Returns `ShopsyncError::Parse` if JSON serialization fails.
pub fn format_enqueued(operation: &Operation, format: OutputFormat) -> Result<String, ShopsyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_enqueued_pretty(operation)),
        OutputFormat::Json => to_json(operation),
    }
}

/// Format a pass outcome based on output format
///
/// # Errors
///
/// Returns `ShopsyncError::Parse` if JSON serialization fails.
pub fn format_pass(outcome: &PassOutcome, format: OutputFormat) -> Result<String, ShopsyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_pass_outcome(outcome)),
        OutputFormat::Json => to_json(outcome),
    }
}
