use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{Alert, Fanout, REASON_HEARTBEAT};

/// Periodic liveness alert, so a silent monitor can be told apart from a
/// healthy one. Runs on its own timer, independent of the monitoring
/// ticker, and stops when the shared shutdown token fires.
pub async fn heartbeat_loop(
    fanout: Arc<Fanout>,
    interval: Duration,
    process_name: String,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so heartbeats start one
    // interval after startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                let alert = Alert::new(
                    "integrity monitor alive",
                    REASON_HEARTBEAT,
                    "",
                    process_name.clone(),
                );
                if let Err(err) = fanout.send(&alert).await {
                    warn!(error = %err, "heartbeat delivery failed");
                }
            }
        }
    }
}
