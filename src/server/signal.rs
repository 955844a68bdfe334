// Signal handling module
//
// Supported signals:
// - SIGINT:  Graceful shutdown (Ctrl+C)
// - SIGTERM: Graceful shutdown
//
// Handlers are installed by `ShutdownSignal::register` before the server
// announces itself, so a signal arriving right after startup is never lost.

use std::io;

use crate::logger;

/// Registered shutdown signal streams
pub struct ShutdownSignal {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    /// Install the signal handlers. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to install a handler.
    #[cfg(unix)]
    pub fn register() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Install the signal handlers. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Never fails on this platform; Ctrl+C is awaited lazily.
    #[cfg(not(unix))]
    pub fn register() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the first shutdown signal
    #[cfg(unix)]
    pub async fn recv(mut self) {
        let name = tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        };
        logger::log_shutdown_requested(name);
    }

    /// Wait for the first shutdown signal
    #[cfg(not(unix))]
    pub async fn recv(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            logger::log_error(&format!("Failed to listen for Ctrl+C: {e}"));
            return;
        }
        logger::log_shutdown_requested("Ctrl+C");
    }
}
