//! Miscellaneous helper utilities.

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

/// Initialize `tracing` subscriber with env-based filter.
///
/// If `RUST_LOG` is not set, defaults to `info` level.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Spawns a task that flips the process-wide shutdown flag on Ctrl-C.
pub fn spawn_shutdown_listener(tx: watch::Sender<bool>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("[SHUTDOWN] interrupt received"),
            Err(e) => tracing::warn!(error = %e, "[SHUTDOWN] signal listener failed; stopping"),
        }
        let _ = tx.send(true);
    })
}
