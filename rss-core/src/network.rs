use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStatus {
    pub is_online: bool,
    pub last_checked: DateTime<Utc>,
}

/// Publishes online/offline transitions to any number of watchers.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    tx: Arc<watch::Sender<NetworkStatus>>,
}

impl NetworkMonitor {
    pub fn new(is_online: bool) -> Self {
        let (tx, _) = watch::channel(NetworkStatus {
            is_online,
            last_checked: Utc::now(),
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn status(&self) -> NetworkStatus {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.tx.borrow().is_online
    }

    pub fn set_online(&self, is_online: bool) {
        let was_online = self.is_online();
        self.tx.send_replace(NetworkStatus {
            is_online,
            last_checked: Utc::now(),
        });
        if was_online != is_online {
            info!(is_online, "network status changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watchers_see_transitions() {
        let monitor = NetworkMonitor::new(true);
        let mut rx = monitor.subscribe();
        let before = monitor.status().last_checked;

        monitor.set_online(false);
        rx.changed().await.unwrap();
        assert!(!rx.borrow().is_online);
        assert!(monitor.status().last_checked >= before);
        assert!(!monitor.is_online());
    }
}
