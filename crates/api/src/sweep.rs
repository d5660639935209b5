//! Periodic outbox retry sweep.

use std::sync::Arc;
use std::time::Duration;

use application::Outbox;
use messaging::Broker;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Republishes queued events every `interval` until `stop` turns true.
///
/// Events only stay queued after a broker failure, so most sweeps find
/// nothing to do.
pub async fn run<B: Broker>(
    outbox: Arc<Outbox<B>>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = outbox.retry_pending().await;
                metrics::gauge!("outbox_pending_events").set(report.deferred as f64);
                if let Some(error) = report.error {
                    tracing::warn!(deferred = report.deferred, %error, "outbox sweep incomplete");
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("outbox sweep stopped");
}
