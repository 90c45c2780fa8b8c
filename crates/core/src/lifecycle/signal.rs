//! Shutdown (SIGINT/SIGTERM) and reload (SIGHUP) signal handling.

use tokio::sync::watch;

pub struct SignalHandler {
    shutdown_tx: watch::Sender<bool>,
}

impl SignalHandler {
    /// Returns the handler and a receiver that flips to `true` on shutdown.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { shutdown_tx: tx }, rx)
    }

    /// Wait for signals until a shutdown is requested, invoking `on_reload`
    /// for every SIGHUP (unix only).
    pub async fn run<F>(self, on_reload: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            let mut sighup =
                signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("SIGINT received, shutting down");
                        break;
                    }
                    _ = sigterm.recv() => {
                        tracing::info!("SIGTERM received, shutting down");
                        break;
                    }
                    _ = sighup.recv() => {
                        tracing::info!("SIGHUP received, reloading configuration");
                        on_reload();
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = &on_reload;
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for Ctrl+C: {e}");
            }
            tracing::info!("Ctrl+C received, shutting down");
        }

        self.trigger();
    }

    /// Request shutdown without waiting for a signal.
    pub fn trigger(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}
