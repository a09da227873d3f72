//! Shutdown coordination for the server.

use tokio::sync::watch;

/// Coordinator for graceful shutdown.
///
/// Cloneable; triggering any clone releases every waiter, including those
/// that start waiting after the trigger.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once shutdown has been triggered.
    pub fn wait(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            // Err means every sender is gone, which can only follow a trigger or drop.
            let _ = rx.wait_for(|triggered| *triggered).await;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_releases_waiters() {
        let shutdown = Shutdown::new();
        let early = shutdown.wait();
        assert!(!shutdown.is_triggered());

        shutdown.clone().trigger();
        tokio::time::timeout(Duration::from_secs(1), early).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), shutdown.wait()).await.unwrap();
        assert!(shutdown.is_triggered());
    }
}
