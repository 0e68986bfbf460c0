//! Graceful shutdown handling for Roster server

use std::time::Duration;

use futures::future::join_all;
use roster_registry::ShutdownSignal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
///
/// Returns a signal that is triggered once either arrives.
pub fn wait_for_shutdown_signal() -> ShutdownSignal {
    let shutdown = ShutdownSignal::new();
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }

        shutdown_clone.trigger();
    });

    shutdown
}

/// Graceful shutdown coordinator
///
/// Triggers the shared signal and waits, bounded by a timeout, for the
/// background tasks that observe it.
pub struct GracefulShutdown {
    shutdown_signal: ShutdownSignal,
    shutdown_timeout: Duration,
}

impl GracefulShutdown {
    pub fn new(shutdown_signal: ShutdownSignal, shutdown_timeout: Duration) -> Self {
        Self {
            shutdown_signal,
            shutdown_timeout,
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.shutdown_signal.clone()
    }

    /// Returns true when every task finished before the timeout
    pub async fn drain(&self, tasks: Vec<JoinHandle<()>>) -> bool {
        self.shutdown_signal.trigger();

        let count = tasks.len();
        info!(
            tasks = count,
            "Shutdown initiated, waiting up to {:?} for background tasks...",
            self.shutdown_timeout
        );

        match tokio::time::timeout(self.shutdown_timeout, join_all(tasks)).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        warn!("Background task ended abnormally: {}", e);
                    }
                }
                info!("Shutdown complete");
                true
            }
            Err(_) => {
                warn!(tasks = count, "Shutdown timed out, abandoning background tasks");
                false
            }
        }
    }
}
