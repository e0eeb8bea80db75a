//! SIGINT / SIGTERM handling

use anyhow::Result;
use filejob_core::application::ShutdownSender;
use tracing::info;

/// Forward the first termination signal to the worker's shutdown channel
#[cfg(unix)]
pub fn install(shutdown: ShutdownSender) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        }
        shutdown.shutdown();
    });
    Ok(())
}

#[cfg(not(unix))]
pub fn install(shutdown: ShutdownSender) -> Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            shutdown.shutdown();
        }
    });
    Ok(())
}
