//! Per-kind operation handlers.
//!
//! A handler replays one operation against the remote side. It must be safe
//! to call more than once for the same operation: the queue delivers at
//! least once.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::operation::{Action, OperationKind, Payload};

/// How a handler failure affects the retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying (network error, 5xx, timeouts, rate limits).
    Transient,
    /// Retrying cannot help (validation rejection, missing remote id).
    Permanent,
}

/// Error returned by a handler.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    /// Retry classification
    pub class: FailureClass,
    /// Human-readable cause
    pub message: String,
}

impl HandlerError {
    /// A failure that consumes one attempt.
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Transient,
            message: message.into(),
        }
    }

    /// A failure that exhausts the retry budget at once.
    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Permanent,
            message: message.into(),
        }
    }

    /// Whether the operation should be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.class == FailureClass::Transient
    }
}

/// Replays operations of one kind.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Perform `action` with `payload`; returns the remote result on success.
    async fn handle(&self, action: Action, payload: &Payload)
        -> Result<serde_json::Value, HandlerError>;
}

/// Maps operation kinds to handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<OperationKind, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the same handler for every kind.
    #[must_use]
    pub fn uniform(handler: Arc<dyn Handler>) -> Self {
        let mut registry = Self::new();
        for kind in OperationKind::ALL {
            registry.register(kind, handler.clone());
        }
        registry
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: OperationKind, handler: Arc<dyn Handler>) -> &mut Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Handler for `kind`.
    #[must_use]
    pub fn get(&self, kind: OperationKind) -> Option<Arc<dyn Handler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Dispatch to the handler for the payload's kind.
    ///
    /// A missing handler is a permanent failure.
    pub async fn dispatch(
        &self,
        action: Action,
        payload: &Payload,
    ) -> Result<serde_json::Value, HandlerError> {
        let kind = payload.kind();
        match self.get(kind) {
            Some(handler) => handler.handle(action, payload).await,
            None => Err(HandlerError::permanent(format!(
                "No handler registered for {kind}"
            ))),
        }
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
