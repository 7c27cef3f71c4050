//! Graceful shutdown handling

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Waits for SIGINT or SIGTERM (Ctrl+C on Windows).
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("SIGINT received - initiating graceful shutdown");
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received - initiating graceful shutdown");
            }
        }
    }

    #[cfg(windows)]
    {
        tokio::signal::ctrl_c().await?;
        info!("Ctrl+C received - initiating graceful shutdown");
    }

    Ok(())
}

/// Cancels `token` when a termination signal arrives, or right away if the
/// signal handlers cannot be installed.
pub fn cancel_on_signal(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            result = wait_for_signal() => {
                if let Err(e) = result {
                    error!("Failed to install signal handlers: {}", e);
                }
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
}
