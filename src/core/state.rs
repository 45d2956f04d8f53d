//! Session lifecycle state.
//!
//! One shared cancellation signal (`Shutdown`) is handed to every actor.
//! Ctrl+C triggers it, unblocks the HTTP server and lets in-flight work
//! finish or abort on its own terms.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tiny_http::Server;
use tokio::sync::watch;

/// Shutdown has been requested (Ctrl+C received)
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// HTTP server reference for graceful shutdown
static SERVER: OnceLock<Arc<Server>> = OnceLock::new();

/// Session-wide cancellation signal
static SIGNAL: OnceLock<Shutdown> = OnceLock::new();

// =============================================================================
// Shutdown signal
// =============================================================================

/// Cloneable cancellation signal.
///
/// Once triggered it stays triggered; `cancelled()` resolves immediately for
/// late subscribers.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal has been triggered.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // Sender lives in self, so the channel cannot close under us
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Ctrl+C wiring
// =============================================================================

/// Install the Ctrl+C handler. Call once at program start.
///
/// Before `register_session()` the process exits immediately; afterwards the
/// handler triggers the shared signal and unblocks the HTTP server.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    ctrlc::set_handler(|| {
        SHUTDOWN.store(true, Ordering::SeqCst);

        let Some(signal) = SIGNAL.get() else {
            std::process::exit(0);
        };
        crate::log!("serve"; "shutting down...");
        signal.trigger();

        if let Some(server) = SERVER.get() {
            server.unblock();
        }
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Register the session signal (and the HTTP server, once bound).
pub fn register_session(signal: Shutdown, server: Option<Arc<Server>>) {
    let _ = SIGNAL.set(signal);
    if let Some(server) = server {
        let _ = SERVER.set(server);
    }
}

/// Check if shutdown has been requested
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed) || SIGNAL.get().is_some_and(Shutdown::is_triggered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_trigger_is_sticky() {
        let signal = Shutdown::new();
        assert!(!signal.is_triggered());

        let clone = signal.clone();
        clone.trigger();
        assert!(signal.is_triggered());
        clone.trigger();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_trigger() {
        let signal = Shutdown::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_after_trigger_is_immediate() {
        let signal = Shutdown::new();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(100), signal.cancelled())
            .await
            .expect("already triggered");
    }
}
