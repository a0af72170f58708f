use tokio::signal::unix::{signal, SignalKind};

/// Resolves with the name of the first SIGTERM or SIGINT received. Never
/// resolves when the handlers can not be registered.
pub async fn shutdown() -> &'static str {
    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(err), _) | (_, Err(err)) => {
                warn!(message = "failed to register signal handler", ?err);
                return std::future::pending().await;
            }
        };

    debug!(message = "start watching signals");

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}
