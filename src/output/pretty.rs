use chrono::Utc;
use colored::Colorize;

use crate::sync::{Operation, Payload, Priority, QueueStatus};

/// Format queue status as pretty output
pub fn format_status_pretty(status: &QueueStatus, online: Option<bool>) -> String {
    let mut lines = Vec::new();

    lines.push("Sync Queue Status".bold().to_string());
    lines.push("─".repeat(40));

    lines.push(format!(
        "  Pending:    {} {}",
        status.pending,
        if status.pending > 0 {
            "operations waiting".dimmed()
        } else {
            "".dimmed()
        }
    ));

    lines.push(format!(
        "  Failed:     {} {}",
        status.failed,
        if status.failed > 0 {
            "operations need attention".red()
        } else {
            "".normal()
        }
    ));

    lines.push(format!("  Total:      {}", status.total));

    if let Some(online) = online {
        let state = if online { "online".green() } else { "offline".yellow() };
        lines.push(format!("  Network:    {state}"));
    }

    if status.is_processing {
        lines.push(format!("  {}", "A sync pass is running".cyan()));
    }

    if status.persist_failures > 0 {
        lines.push(format!(
            "  {}",
            format!("{} saves failed; queue is only in memory", status.persist_failures).red()
        ));
    }

    if status.failed > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'shopsync retry' to try failed operations again, or 'shopsync clear-failed' to drop them"
                .dimmed()
                .to_string(),
        );
    } else if status.pending > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'shopsync run' to sync pending operations"
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

/// Format queued operations as a pretty table
pub fn format_operations_pretty(operations: &[Operation], title: &str) -> String {
    if operations.is_empty() {
        return format!("{title} (0)\n  No operations");
    }

    let mut output = format!("{title} ({})\n", operations.len());
    output.push_str(&"─".repeat(72));
    output.push('\n');

    for op in operations {
        output.push_str(&format_operation_line(op));
        output.push('\n');
    }

    output
}

/// One table row for an operation.
pub fn format_operation_line(op: &Operation) -> String {
    let icon = if op.is_failed() {
        "✗".red()
    } else if op.attempts > 0 {
        "↻".yellow()
    } else {
        "•".white()
    };

    let priority = match op.priority {
        Priority::High => "high".red(),
        Priority::Medium => "medium".yellow(),
        Priority::Low => "low".dimmed(),
    };

    let short_id: String = op.id.to_string().chars().take(8).collect();
    let mut line = format!(
        "{icon} {} {:<6} {:<10} {:<6} {}",
        short_id.dimmed(),
        op.action.to_string(),
        op.kind().to_string().bold(),
        priority,
        describe(&op.payload)
    );

    if op.attempts > 0 {
        line.push_str(&format!(
            "  {}",
            format!("{}/{} attempts", op.attempts, op.max_attempts).yellow()
        ));
    }

    line.push_str(&format!("  {}", age(op).dimmed()));

    if let Some(error) = &op.last_error {
        line.push_str(&format!("\n    {}", error.red()));
    }

    line
}

/// Format a newly queued operation
pub fn format_enqueued_pretty(op: &Operation) -> String {
    format!(
        "{} Queued {} {} ({}, id {})",
        "✓".green(),
        op.action,
        op.kind().to_string().bold(),
        op.priority,
        op.id
    )
}

fn describe(payload: &Payload) -> String {
    match payload {
        Payload::Diagnostic(d) => d.summary.clone(),
        Payload::Device(d) => format!("{} {}", d.model, d.serial_number),
        Payload::Backup(b) => b.location.clone(),
        Payload::Report(r) => r.title.clone(),
    }
}

fn age(op: &Operation) -> String {
    let age = Utc::now().signed_duration_since(op.enqueued_at);
    if age.num_days() > 0 {
        format!("{}d ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{}h ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{}m ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{Action, BackupPayload, ReportPayload};

    fn backup() -> Operation {
        Operation::new(
            Action::Create,
            Payload::Backup(BackupPayload {
                id: None,
                device_id: "dev-1".to_string(),
                location: "nas://vault/dev-1.tar".to_string(),
                size_bytes: None,
                taken_at: Utc::now(),
            }),
            Priority::Low,
            3,
        )
    }

    #[test]
    fn test_empty_operations() {
        colored::control::set_override(false);
        let output = format_operations_pretty(&[], "Queued");
        assert!(output.contains("Queued (0)"));
        assert!(output.contains("No operations"));
    }

    #[test]
    fn test_operation_line_shows_failure() {
        colored::control::set_override(false);
        let mut op = backup();
        op.record_failure("503 Service Unavailable", Utc::now());

        let line = format_operation_line(&op);
        assert!(line.contains("backup"));
        assert!(line.contains("nas://vault/dev-1.tar"));
        assert!(line.contains("1/3 attempts"));
        assert!(line.contains("503 Service Unavailable"));
    }

    #[test]
    fn test_status_hints() {
        colored::control::set_override(false);
        let status = QueueStatus {
            total: 2,
            pending: 1,
            failed: 1,
            is_processing: false,
            persist_failures: 0,
        };
        let output = format_status_pretty(&status, Some(false));
        assert!(output.contains("offline"));
        assert!(output.contains("shopsync retry"));
    }

    #[test]
    fn test_enqueued_message() {
        colored::control::set_override(false);
        let op = Operation::new(
            Action::Update,
            Payload::Report(ReportPayload {
                id: Some("r-1".to_string()),
                device_id: None,
                title: "Q3".to_string(),
                body: serde_json::Value::Null,
            }),
            Priority::High,
            3,
        );
        let output = format_enqueued_pretty(&op);
        assert!(output.contains("Queued update report (high"));
    }
}
