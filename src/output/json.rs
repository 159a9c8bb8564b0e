//! JSON output formatting for shopsync.

use serde::Serialize;
use serde_json::json;

use crate::error::ShopsyncError;
use crate::sync::{Operation, QueueStatus};

/// Format queue status as JSON
///
/// # Errors
///
/// Returns `ShopsyncError::Parse` if JSON serialization fails.
pub fn format_status_json(status: &QueueStatus, online: Option<bool>) -> Result<String, ShopsyncError> {
    let output = json!({
        "total": status.total,
        "pending": status.pending,
        "failed": status.failed,
        "is_processing": status.is_processing,
        "persist_failures": status.persist_failures,
        "online": online,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format operations as JSON
///
/// # Errors
///
/// Returns `ShopsyncError::Parse` if JSON serialization fails.
pub fn format_operations_json(operations: &[Operation]) -> Result<String, ShopsyncError> {
    let output = json!({
        "count": operations.len(),
        "items": operations
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Serialize any value as pretty JSON
///
/// # Errors
///
/// Returns `ShopsyncError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, ShopsyncError> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::sync::{Action, DiagnosticPayload, Payload, Priority};

    #[test]
    fn test_status_json() {
        let status = QueueStatus {
            total: 3,
            pending: 2,
            failed: 1,
            is_processing: false,
            persist_failures: 0,
        };
        let value: serde_json::Value =
            serde_json::from_str(&format_status_json(&status, None).unwrap()).unwrap();
        assert_eq!(value["pending"], 2);
        assert_eq!(value["failed"], 1);
        assert!(value["online"].is_null());
    }

    #[test]
    fn test_operations_json_carries_payload() {
        let mut op = Operation::new(
            Action::Create,
            Payload::Diagnostic(DiagnosticPayload {
                id: None,
                device_id: "dev-4".to_string(),
                technician: None,
                summary: "No POST".to_string(),
                results: json!({"ram": "fail"}),
            }),
            Priority::Medium,
            3,
        );
        op.record_failure("timeout", Utc::now());

        let value: serde_json::Value =
            serde_json::from_str(&format_operations_json(&[op]).unwrap()).unwrap();
        assert_eq!(value["count"], 1);
        let item = &value["items"][0];
        assert_eq!(item["payload"]["kind"], "diagnostic");
        assert_eq!(item["payload"]["data"]["summary"], "No POST");
        assert_eq!(item["attempts"], 1);
        assert_eq!(item["last_error"], "timeout");
    }
}
