//! OS signal handling.

use crate::lifecycle::Shutdown;

/// Trigger `shutdown` on the first Ctrl+C.
pub fn shutdown_on_ctrl_c(shutdown: Shutdown) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl+C received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
        }
        shutdown.trigger();
    });
}
