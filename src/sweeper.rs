use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::rate_limit::Limiter;

// Background eviction of idle buckets, stopped by shutdown()
pub struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Sweeper {
    // Needs a running Tokio runtime and a non-zero interval
    pub fn spawn(limiter: Arc<Limiter>, every: Duration) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_sweep_loop(limiter, every, cancel.clone()));
        Self { cancel, handle }
    }

    // Stop the task and wait for it to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "idle sweep task did not exit cleanly");
        }
    }
}

async fn run_sweep_loop(limiter: Arc<Limiter>, every: Duration, cancel: CancellationToken) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        limiter = limiter.name(),
        interval_secs = every.as_secs_f64(),
        idle_window_secs = limiter.config().idle_eviction_window.as_secs_f64(),
        "idle sweep started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(limiter = limiter.name(), "idle sweep shutting down");
                break;
            }
            _ = ticker.tick() => {
                limiter.evict_idle(limiter.now());
            }
        }
    }
}
