//! Online/offline state.
//!
//! [`Connectivity`] is the observer the queue consults before a pass and
//! the source of reconnect triggers. Hosts push state into it; in daemon
//! mode [`ConnectivityProbe`] does so by polling the API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::ShopsyncError;

/// Shared online/offline flag with change notification.
///
/// Besides the flag, every offline to online edge bumps a reconnect
/// counter, so a watcher that was busy still sees a reconnect even when
/// the flag has flipped back and forth in the meantime.
#[derive(Debug, Clone)]
pub struct Connectivity {
    tx: Arc<watch::Sender<bool>>,
    reconnects: Arc<watch::Sender<u64>>,
}

impl Connectivity {
    /// Start in the given state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        let (reconnects, _rx) = watch::channel(0);
        Self {
            tx: Arc::new(tx),
            reconnects: Arc::new(reconnects),
        }
    }

    /// Start online.
    #[must_use]
    pub fn online() -> Self {
        Self::new(true)
    }

    /// Start offline.
    #[must_use]
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Current state.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Update the state. Returns whether it changed; subscribers are only
    /// woken on a change.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            if online {
                self.reconnects.send_modify(|count| *count += 1);
                tracing::info!("Connectivity restored");
            } else {
                tracing::warn!("Connectivity lost, queueing offline");
            }
        }
        changed
    }

    /// Receiver notified on every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Receiver whose value counts offline to online edges.
    #[must_use]
    pub fn subscribe_reconnects(&self) -> watch::Receiver<u64> {
        self.reconnects.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::online()
    }
}

/// Polls the API base URL and publishes reachability.
///
/// Any HTTP response counts as online; transport errors count as offline.
pub struct ConnectivityProbe {
    client: Client,
    url: String,
    interval: Duration,
}

impl ConnectivityProbe {
    /// Probe `url` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, interval: Duration) -> Result<Self, ShopsyncError> {
        let client = Client::builder()
            .timeout(interval.min(Duration::from_secs(5)))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            interval,
        })
    }

    /// Probe once.
    pub async fn check(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(response) => {
                tracing::trace!(status = %response.status(), "Connectivity probe answered");
                true
            }
            Err(e) => {
                tracing::debug!("Connectivity probe failed: {e}");
                false
            }
        }
    }

    /// Probe until `shutdown` fires, publishing into `connectivity`.
    pub async fn run(self, connectivity: Connectivity, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let online = self.check().await;
                    connectivity.set_online(online);
                }
            }
        }

        tracing::debug!("Connectivity probe stopped");
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_set_online_reports_changes() {
        let connectivity = Connectivity::offline();
        assert!(!connectivity.is_online());

        assert!(connectivity.set_online(true));
        assert!(!connectivity.set_online(true));
        assert!(connectivity.is_online());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions_only() {
        let connectivity = Connectivity::online();
        let mut rx = connectivity.subscribe();

        connectivity.set_online(true);
        assert!(!rx.has_changed().unwrap());

        connectivity.set_online(false);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
    }

    #[tokio::test]
    async fn test_reconnects_counted_across_flaps() {
        let connectivity = Connectivity::online();
        let mut rx = connectivity.subscribe_reconnects();

        connectivity.set_online(false);
        connectivity.set_online(true);
        connectivity.set_online(false);
        connectivity.set_online(true);
        connectivity.set_online(true);

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 2);
        assert!(connectivity.is_online());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let a = Connectivity::online();
        let b = a.clone();
        b.set_online(false);
        assert!(!a.is_online());
    }

    #[tokio::test]
    async fn test_probe_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let probe = ConnectivityProbe::new(format!("http://{addr}"), Duration::from_secs(1)).unwrap();
        assert!(probe.check().await);
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = ConnectivityProbe::new(format!("http://{addr}"), Duration::from_secs(1)).unwrap();
        assert!(!probe.check().await);
    }
}
