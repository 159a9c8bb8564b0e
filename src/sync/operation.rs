//! Operation types for the sync queue.
//!
//! Defines the operations that can be queued and their typed payloads.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Domain category of an operation; routes it to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Device diagnostic results
    Diagnostic,
    /// Customer device records
    Device,
    /// Device backup records
    Backup,
    /// Generated reports
    Report,
}

impl OperationKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 4] = [Self::Diagnostic, Self::Device, Self::Backup, Self::Report];

    /// Resource segment used in API paths.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Diagnostic => "diagnostic",
            Self::Device => "device",
            Self::Backup => "backup",
            Self::Report => "report",
        }
    }

    /// Priority used when the caller does not pick one.
    #[must_use]
    pub const fn default_priority(&self) -> Priority {
        match self {
            Self::Diagnostic | Self::Device => Priority::Medium,
            Self::Backup | Self::Report => Priority::Low,
        }
    }

    /// Parse from a string.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "diagnostic" | "diagnostics" => Some(Self::Diagnostic),
            "device" | "devices" => Some(Self::Device),
            "backup" | "backups" => Some(Self::Backup),
            "report" | "reports" => Some(Self::Report),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutation replayed against the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Create a new resource
    Create,
    /// Update an existing resource
    Update,
    /// Delete an existing resource
    Delete,
}

impl Action {
    /// Whether the action targets an existing remote resource.
    #[must_use]
    pub const fn requires_remote_id(&self) -> bool {
        matches!(self, Self::Update | Self::Delete)
    }

    /// Parse from a string.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

/// Processing priority. Variant order is the processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Processed first
    High,
    /// Processed after high
    Medium,
    /// Processed last
    Low,
}

impl Priority {
    /// Parse from a string.
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "high" | "h" => Some(Self::High),
            "medium" | "med" | "m" => Some(Self::Medium),
            "low" | "l" => Some(Self::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// Payload for diagnostic operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticPayload {
    /// Remote id; required for update and delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician: Option<String>,
    pub summary: String,
    /// Raw test results as reported by the diagnostic tool.
    #[serde(default)]
    pub results: serde_json::Value,
}

/// Payload for device operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePayload {
    /// Remote id; required for update and delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub serial_number: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Payload for backup operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub device_id: String,
    /// Where the backup archive lives (path or object URL).
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub taken_at: DateTime<Utc>,
}

/// Payload for report operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub body: serde_json::Value,
}

/// Typed payload; the variant determines the operation kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Diagnostic(DiagnosticPayload),
    Device(DevicePayload),
    Backup(BackupPayload),
    Report(ReportPayload),
}

impl Payload {
    /// Kind this payload routes to.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Diagnostic(_) => OperationKind::Diagnostic,
            Self::Device(_) => OperationKind::Device,
            Self::Backup(_) => OperationKind::Backup,
            Self::Report(_) => OperationKind::Report,
        }
    }

    /// Remote resource id, if the payload carries one.
    #[must_use]
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Self::Diagnostic(p) => p.id.as_deref(),
            Self::Device(p) => p.id.as_deref(),
            Self::Backup(p) => p.id.as_deref(),
            Self::Report(p) => p.id.as_deref(),
        }
    }

    /// Request body sent to the remote API.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn body(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Diagnostic(p) => serde_json::to_value(p),
            Self::Device(p) => serde_json::to_value(p),
            Self::Backup(p) => serde_json::to_value(p),
            Self::Report(p) => serde_json::to_value(p),
        }
    }

    /// Parse a raw JSON body into the payload for `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` does not match the shape for `kind`.
    pub fn from_json(kind: OperationKind, data: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            OperationKind::Diagnostic => Self::Diagnostic(serde_json::from_value(data)?),
            OperationKind::Device => Self::Device(serde_json::from_value(data)?),
            OperationKind::Backup => Self::Backup(serde_json::from_value(data)?),
            OperationKind::Report => Self::Report(serde_json::from_value(data)?),
        })
    }
}

/// A queued operation with retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique ID
    pub id: Uuid,
    /// Remote mutation to replay
    pub action: Action,
    /// Typed payload; also determines the kind
    pub payload: Payload,
    /// When the operation was queued
    pub enqueued_at: DateTime<Utc>,
    /// Number of failed attempts
    pub attempts: u32,
    /// Attempts allowed before the operation is permanently failed
    pub max_attempts: u32,
    /// Processing priority
    pub priority: Priority,
    /// Last failed attempt timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<DateTime<Utc>>,
    /// Last error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Operation {
    /// Create a new operation with no attempts.
    #[must_use]
    pub fn new(action: Action, payload: Payload, priority: Priority, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            payload,
            enqueued_at: Utc::now(),
            attempts: 0,
            max_attempts,
            priority,
            last_attempt: None,
            last_error: None,
        }
    }

    /// Kind, derived from the payload.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.payload.kind()
    }

    /// Whether the retry budget is exhausted.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Record a failed attempt.
    pub fn record_failure(&mut self, error: &str, at: DateTime<Utc>) {
        self.attempts = self.attempts.saturating_add(1).min(self.max_attempts);
        self.last_attempt = Some(at);
        self.last_error = Some(error.to_string());
    }

    /// Record a failure that must not be retried.
    pub fn record_permanent_failure(&mut self, error: &str, at: DateTime<Utc>) {
        self.attempts = self.max_attempts;
        self.last_attempt = Some(at);
        self.last_error = Some(error.to_string());
    }

    /// Make a failed operation eligible again.
    pub fn reset_attempts(&mut self) {
        self.attempts = 0;
        self.last_attempt = None;
        self.last_error = None;
    }

    /// Delay before the next retry using exponential backoff.
    ///
    /// `base * 2^(attempts - 1)`, capped at `max`. Zero before the first
    /// failure or when `base` is zero.
    #[must_use]
    pub fn retry_delay(&self, base: Duration, max: Duration) -> Duration {
        if self.attempts == 0 || base <= Duration::zero() {
            return Duration::zero();
        }
        let shift = (self.attempts - 1).min(20);
        base.checked_mul(2_i32.pow(shift))
            .map_or(max, |delay| delay.min(max))
    }

    /// Whether the backoff window after the last failure has elapsed.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>, base: Duration, max: Duration) -> bool {
        self.last_attempt
            .map_or(true, |last| now >= last + self.retry_delay(base, max))
    }
}
