//! Graceful shutdown signaling.
//!
//! The first SIGINT/SIGTERM flips a watch flag the orchestrator observes
//! between candidates and during the long poll; the in-flight candidate is
//! finished and state persisted before exit. A second signal forces
//! immediate termination.

use tokio::sync::watch;
use tracing::info;

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Spawn the signal listener and return the flag receiver.
pub fn listen() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown requested, finishing current task...");
        let _ = tx.send(true);

        wait_for_signal().await;
        info!("Forced shutdown");
        std::process::exit(1);
    });

    rx
}
