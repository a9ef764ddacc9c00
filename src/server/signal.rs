// Signal handling module
//
// Supported signals:
// - SIGINT:  Shutdown (Ctrl+C)
// - SIGTERM: Shutdown (Unix only)

use std::io;
use std::sync::Arc;
use tokio::sync::Notify;

/// Signal handler state
pub struct SignalHandler {
    /// Notified once when a shutdown signal arrives
    pub shutdown: Arc<Notify>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Wake the accept loop
    ///
    /// `notify_one` stores a permit, so a signal that lands before the loop
    /// starts waiting is not lost.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Start signal handlers (Unix)
///
/// Registration happens before this returns, so failures surface at startup.
/// Only the first signal is acted on. The task is dropped with the runtime,
/// so a repeated Ctrl+C during the shutdown grace period is absorbed and the
/// process still exits once that period (at most one second) ends.
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => crate::logger::log_debug("SIGINT received"),
            _ = sigterm.recv() => crate::logger::log_debug("SIGTERM received"),
        }
        handler.request_shutdown();
    });

    Ok(())
}

/// Fallback for other platforms - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> io::Result<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            crate::logger::log_debug("Ctrl+C received");
            handler.request_shutdown();
        }
    });

    Ok(())
}
