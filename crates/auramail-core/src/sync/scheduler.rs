//! Periodic refresh timer.

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Runs a callback on a fixed cadence until stopped.
///
/// The first tick fires immediately. The callback must not block: it is
/// expected to spawn whatever work the tick starts, so a slow refresh never
/// delays the next tick. Returning [`ControlFlow::Break`] ends the loop.
#[derive(Debug)]
pub struct SyncScheduler {
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    /// Spawns the timer on the current runtime.
    pub fn start<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(?interval, "Starting refresh timer");

            let mut ticks = 0u64;
            loop {
                ticker.tick().await;
                ticks += 1;
                debug!(tick = ticks, "Refresh tick");
                if on_tick().is_break() {
                    break;
                }
            }
            info!(ticks, "Refresh timer finished");
        });
        Self { handle }
    }

    /// Cancels the timer. Work already spawned by a tick keeps running.
    pub fn stop(&self) {
        self.handle.abort();
    }

    /// Whether the timer is still ticking.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
