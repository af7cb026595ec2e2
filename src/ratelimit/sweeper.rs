//! Background expiry sweep.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use super::limiter::RateLimiter;

/// Handle to a running periodic sweep task.
///
/// The task holds only a weak reference to the limiter, so it ends when the
/// limiter is dropped as well as when [`stop`](Sweeper::stop) is called.
/// Dropping the handle stops the task.
pub struct Sweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Sweeper {
    /// Spawn the sweep task on `runtime`.
    ///
    /// The first sweep runs one `period` after spawning. Each sweep runs on
    /// the blocking pool so a large scan never stalls request handling.
    pub fn spawn(runtime: &Handle, limiter: Weak<RateLimiter>, period: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(limiter) = limiter.upgrade() else {
                            debug!("Rate limiter dropped, sweeper exiting");
                            break;
                        };
                        let sweep = tokio::task::spawn_blocking(move || run_sweep(&limiter));
                        if let Err(e) = sweep.await {
                            error!(error = %e, "Sweep task failed, retrying on the next tick");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }

            info!("Expiry sweeper stopped");
        });

        info!(interval_ms = period.as_millis() as u64, "Expiry sweeper started");

        Self { shutdown, handle }
    }

    /// Ask the task to stop. Does not wait for it.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    #[cfg(test)]
    pub(crate) fn abort_handle(&self) -> tokio::task::AbortHandle {
        self.handle.abort_handle()
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run one sweep, containing any panic to this cycle.
fn run_sweep(limiter: &RateLimiter) {
    match catch_unwind(AssertUnwindSafe(|| limiter.sweep())) {
        Ok(report) => debug!(
            removed_timestamps = report.removed_timestamps,
            removed_keys = report.removed_keys,
            "Sweep cycle finished"
        ),
        Err(_) => error!("Sweep cycle panicked, retrying on the next tick"),
    }
}
