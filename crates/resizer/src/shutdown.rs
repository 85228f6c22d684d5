//! Graceful shutdown coordination for the resizer service

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::{error, info};

/// Coordinates graceful shutdown across the application
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    notify: Arc<Notify>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger a shutdown
    pub fn shutdown(&self) {
        info!("Shutdown triggered");
        self.triggered.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Whether shutdown has been triggered
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Wait for shutdown. Returns immediately if it was already triggered.
    pub async fn wait_for_shutdown(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        // Register interest before checking the flag so a concurrent trigger is not missed
        notified.as_mut().enable();
        if self.is_shutdown() {
            return;
        }
        notified.await;
    }
}

/// Install signal handlers for graceful shutdown
///
/// Returns a `ShutdownCoordinator` that will be notified when SIGTERM or SIGINT is received
#[must_use]
pub fn install_signal_handlers() -> ShutdownCoordinator {
    let coordinator = ShutdownCoordinator::new();
    let coordinator_clone = coordinator.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                    (Err(e), _) | (_, Err(e)) => {
                        error!(error = %e, "Failed to install signal handlers");
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C handler");
                return;
            }
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        coordinator_clone.shutdown();
    });

    coordinator
}
