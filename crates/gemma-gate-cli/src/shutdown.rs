//! Termination signal handling.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Resolve on the first SIGINT (Ctrl+C) or SIGTERM.
///
/// If a handler cannot be installed that signal is simply never observed.
pub(crate) async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received interrupt, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Background task that fires a shutdown trigger once `signal` resolves.
///
/// Aborting the task (or dropping the watcher) releases the trigger without
/// firing it as a shutdown request.
pub(crate) struct ShutdownWatcher {
    task: JoinHandle<()>,
}

impl ShutdownWatcher {
    /// Spawn a watcher; the returned receiver completes when `signal` does.
    pub(crate) fn spawn<F>(signal: F) -> (Self, oneshot::Receiver<()>)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            signal.await;
            let _ = tx.send(());
        });
        (Self { task }, rx)
    }

    pub(crate) fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for ShutdownWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_watcher_fires_on_signal() {
        let (trigger_tx, trigger_rx) = oneshot::channel::<()>();
        let (_watcher, shutdown) = ShutdownWatcher::spawn(async move {
            let _ = trigger_rx.await;
        });

        trigger_tx.send(()).unwrap();
        let fired = tokio::time::timeout(Duration::from_secs(1), shutdown).await;
        assert!(matches!(fired, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn test_cancelled_watcher_never_fires() {
        let (watcher, shutdown) = ShutdownWatcher::spawn(std::future::pending());

        watcher.cancel();
        let fired = tokio::time::timeout(Duration::from_secs(1), shutdown).await;
        // The sender is dropped with the aborted task.
        assert!(matches!(fired, Ok(Err(_))));
    }
}
