//! Deferred-execution registration.
//!
//! A registrar asks the host platform to wake the process later so queued
//! work drains even when nothing else triggers a pass. Registration is best
//! effort: failure is logged and ignored.

use thiserror::Error;

use super::trigger::PassRequester;

/// Registration failure.
#[derive(Debug, Error)]
pub enum RegistrarError {
    /// The platform has no wake-up facility.
    #[error("Deferred execution is not supported on this platform")]
    Unsupported,

    /// The platform refused the registration.
    #[error("Failed to register for deferred execution: {0}")]
    Registration(#[from] std::io::Error),
}

/// Hooks the process into a platform wake-up facility.
pub trait WakeRegistrar: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Register; every wake-up calls `requester`.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform facility is unavailable.
    fn register(&self, requester: PassRequester) -> Result<(), RegistrarError>;
}

/// Register and log the outcome. Never fails.
pub fn register_best_effort(registrar: &dyn WakeRegistrar, requester: PassRequester) -> bool {
    match registrar.register(requester) {
        Ok(()) => {
            tracing::info!(registrar = registrar.name(), "Registered for deferred execution");
            true
        }
        Err(e) => {
            tracing::warn!(registrar = registrar.name(), "{e}");
            false
        }
    }
}

/// Registrar for hosts without a wake-up facility.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistrar;

impl WakeRegistrar for NoopRegistrar {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn register(&self, _requester: PassRequester) -> Result<(), RegistrarError> {
        Err(RegistrarError::Unsupported)
    }
}

/// Wakes on `SIGUSR1`, so cron or a system timer can run
/// `kill -USR1 <pid>` to force a drain.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalRegistrar;

impl WakeRegistrar for SignalRegistrar {
    fn name(&self) -> &'static str {
        "sigusr1"
    }

    #[cfg(unix)]
    fn register(&self, requester: PassRequester) -> Result<(), RegistrarError> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut stream = signal(SignalKind::user_defined1())?;
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                tracing::debug!("Woken by SIGUSR1");
                requester.request();
            }
        });
        Ok(())
    }

    #[cfg(not(unix))]
    fn register(&self, _requester: PassRequester) -> Result<(), RegistrarError> {
        Err(RegistrarError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_registration_is_tolerated() {
        let requester = PassRequester::new();
        assert!(!register_best_effort(&NoopRegistrar, requester));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_registration() {
        let requester = PassRequester::new();
        assert!(register_best_effort(&SignalRegistrar, requester));
    }
}
