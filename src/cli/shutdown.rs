//! Ctrl-C / SIGTERM handling.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Exit code after an interrupted run.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Cancel `token` on the first SIGINT or SIGTERM.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => warn!("Interrupted (Ctrl+C), finishing up"),
            _ = terminate => warn!("Received SIGTERM, finishing up"),
            _ = token.cancelled() => return,
        }

        token.cancel();
    });
}
