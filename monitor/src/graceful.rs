use tokio_util::sync::CancellationToken;
use tracing::info;

/// Bind SIGINT/SIGTERM to a cancellation token and run `f` with it. This
/// is the only place signals are wired; everything below takes the token
/// as an injected capability.
pub async fn run_until_signalled<F, Fut, T>(f: F) -> T
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = T>,
{
    let token = CancellationToken::new();

    let signal_task = tokio::spawn({
        let token = token.clone();
        async move {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm = signal(SignalKind::terminate()).ok();
            let mut sigint = signal(SignalKind::interrupt()).ok();

            tokio::select! {
                _ = recv_signal(&mut sigterm) => info!("received SIGTERM, stopping"),
                _ = recv_signal(&mut sigint) => info!("received SIGINT, stopping"),
            }
            token.cancel();
        }
    });

    let result = f(token).await;
    signal_task.abort();
    result
}

/// Await a signal if registered, or pend forever if registration failed.
async fn recv_signal(sig: &mut Option<tokio::signal::unix::Signal>) {
    match sig {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}
