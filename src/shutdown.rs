use std::future::Future;
use std::io;

/// Resolves on Ctrl-C or SIGTERM. A listener that cannot be installed never
/// fires, so the server keeps running on the remaining one.
pub async fn shutdown_signal() {
    let ctrl_c = signal_or_pending("Ctrl-C", tokio::signal::ctrl_c());

    #[cfg(unix)]
    let terminate = signal_or_pending("SIGTERM", async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        signal.recv().await;
        Ok::<(), io::Error>(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn signal_or_pending<F>(name: &str, listener: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = listener.await {
        tracing::error!("❌ Failed to listen for {}: {}", name, e);
        std::future::pending::<()>().await;
    }
}
