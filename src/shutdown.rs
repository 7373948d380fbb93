//! Provides a shutdown signal to gracefully shut down the server.
//!
//! See: [`signal`], [`SHUTDOWN`]

#![cfg(feature = "shutdown")]

use crate::static_lazy_lock;

use tokio::{signal, sync::broadcast};
use tracing::{error, info};

static_lazy_lock! {
    /// The broadcast sender to shut down the server from within the process.
    ///
    /// Sent to by [`forward_terminate`] on SIGTERM. Code embedding the server may send to it as well.
    pub SHUTDOWN: broadcast::Sender<()> = broadcast::channel(1).0;
}

/// Sends to [`SHUTDOWN`] once the process receives SIGTERM, as service managers and container runtimes send to stop it.
///
/// # Errors
///
/// Returns an error if the SIGTERM handler cannot be installed.
#[cfg(unix)]
pub fn forward_terminate() -> std::io::Result<()> {
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::spawn(async move {
        if terminate.recv().await.is_some() {
            info!("received SIGTERM");
            if SHUTDOWN.send(()).is_err() {
                tracing::warn!("received SIGTERM before the server was listening");
            }
        }
    });
    Ok(())
}

/// Resolves once the server should stop accepting connections: on Ctrl + C, or when [`SHUTDOWN`] is sent to.
///
/// Failing to install the Ctrl + C handler leaves [`SHUTDOWN`] as the only way to stop.
pub async fn signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl + C signal handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    let mut shutdown = SHUTDOWN.subscribe();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl + C, shutting down…"),
        _ = shutdown.recv() => info!("shutting down…"),
    }
}
