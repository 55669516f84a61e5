use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::info;

use waypool_trips::StatusReconciler;

/// Run the status reconciler on its own task, off the request path. The
/// returned handle is the stop switch: abort it (or drop the runtime) and
/// the sweeps stop; nothing is left half-written because each sweep batch
/// commits atomically.
pub fn spawn_reconciler(
    reconciler: Arc<StatusReconciler>,
    interval_seconds: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(interval_seconds.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_seconds, "status reconciler started");

        loop {
            ticker.tick().await;
            reconciler.run_sweep().await;
        }
    })
}
