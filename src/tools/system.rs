//! Process lifecycle helpers.
//!
//! The webserver runner installs a termination listener at startup and drives
//! its graceful shutdown off [`await_shutdown`]. Other long-running tasks can
//! poll [`is_running`] to wind down alongside the server.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};

static RUNNING: AtomicBool = AtomicBool::new(true);

/// Spawns a background task that flips the running flag on SIGINT, SIGTERM
/// or SIGHUP.
pub fn install_termination_listener() {
    tokio::spawn(async move {
        let mut sig_term = signal(SignalKind::terminate()).ok();
        let mut sig_int = signal(SignalKind::interrupt()).ok();
        let mut sig_hup = signal(SignalKind::hangup()).ok();

        tokio::select! {
            Some(_) = async { sig_int.as_mut()?.recv().await } => {
                tracing::info!("Received SIGINT. Shutting down...");
            },
            Some(_) = async { sig_term.as_mut()?.recv().await } => {
                tracing::info!("Received SIGTERM. Shutting down...");
            },
            Some(_) = async { sig_hup.as_mut()?.recv().await } => {
                tracing::info!("Received SIGHUP. Shutting down...");
            },
        }

        RUNNING.store(false, Ordering::Relaxed);
    });
}

/// Whether the process has been asked to shut down.
pub fn is_running() -> bool {
    RUNNING.load(Ordering::Relaxed)
}

/// Resolves once a termination signal has been received.
pub async fn await_shutdown() {
    while is_running() {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
