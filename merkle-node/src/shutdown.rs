//! Ctrl+C / SIGTERM fan-out.
//!
//! The authority stops accepting on the first signal; a running validity
//! client treats the same signal as cancellation.

use tokio::sync::broadcast;
use tracing::{error, info};

pub struct Shutdown {
    tx_shutdown: broadcast::Sender<()>,
}

impl Default for Shutdown {
    fn default() -> Self {
        let (tx_shutdown, _) = broadcast::channel(1);
        Self { tx_shutdown }
    }
}

impl Shutdown {
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx_shutdown.subscribe()
    }

    /// Broadcast a shutdown without waiting for a signal
    pub fn trigger(&self) {
        // No subscribers left is fine
        let _ = self.tx_shutdown.send(());
    }

    /// Resolve once a subscriber receives the shutdown
    pub async fn wait(mut rx: broadcast::Receiver<()>) {
        let _ = rx.recv().await;
    }

    /// Wait for Ctrl+C (or SIGTERM on unix) and broadcast it
    pub fn listen_for_signals(&self) {
        let tx = self.tx_shutdown.clone();

        tokio::spawn(async move {
            match wait_for_signal().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    let _ = tx.send(());
                }
                Err(e) => error!(error = %e, "Cannot listen for shutdown signal"),
            }
        });
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
