//! Shutdown coordination via `CancellationToken`.
//!
//! Interrupt (all platforms) and terminate (unix) both cancel the same
//! token. The bridge loop watches it and abandons in-flight POSTs.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the process-wide shutdown token.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token on the first interrupt or terminate signal.
    ///
    /// The task also ends quietly if the token is cancelled by other means.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                signal = wait_for_signal() => {
                    info!(signal, "shutdown signal received");
                    token.cancel();
                }
            }
        })
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => tokio::select! {
                () = interrupt() => "interrupt",
                _ = terminate.recv() => "terminate",
            },
            Err(err) => {
                warn!(error = %err, "cannot install SIGTERM handler");
                interrupt().await;
                "interrupt"
            }
        }
    }
    #[cfg(not(unix))]
    {
        interrupt().await;
        "interrupt"
    }
}

async fn interrupt() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "cannot listen for interrupt; only input close will stop the bridge");
        std::future::pending::<()>().await;
    }
}
