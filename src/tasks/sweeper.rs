//! Cache Sweeper Task
//!
//! Background task that periodically removes expired and stale cache entries.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::cache::Shared;
use crate::error::CacheError;

// == Sweeper State ==
/// Lifecycle of a cache's sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweeperState {
    /// No refresh or expire duration has been set yet
    Idle,
    /// The periodic loop is active
    Running,
    /// Shutdown was requested; terminal
    Stopped,
}

/// Sweeper slot held by the cache.
#[derive(Debug)]
pub(crate) enum SweeperSlot {
    Idle,
    Running {
        stop: Arc<AtomicBool>,
        task: JoinHandle<()>,
    },
    Stopped,
}

impl SweeperSlot {
    pub(crate) fn state(&self) -> SweeperState {
        match self {
            SweeperSlot::Idle => SweeperState::Idle,
            SweeperSlot::Running { .. } => SweeperState::Running,
            SweeperSlot::Stopped => SweeperState::Stopped,
        }
    }

    /// Signals the loop to exit at its next wake. A pass already running completes.
    pub(crate) fn stop(&mut self) {
        let previous = std::mem::replace(self, SweeperSlot::Stopped);
        if let SweeperSlot::Running { stop, task } = previous {
            stop.store(true, Ordering::Release);
            debug!(finished = task.is_finished(), "Sweeper stop requested");
        }
    }
}

/// Spawns the sweeper loop on `runtime`.
///
/// The task wakes every `interval`, checks the stop flag, then runs one
/// [`sweep`] pass on the blocking pool, so slow listeners never stall the
/// runtime's async workers. It holds only a weak reference to the cache and
/// exits on its own once the cache is dropped. A panic inside a pass is
/// logged and the loop carries on at the next wake.
pub(crate) fn spawn_sweeper<V>(
    shared: Weak<Shared<V>>,
    runtime: &Handle,
    interval: Duration,
) -> SweeperSlot
where
    V: Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let task = runtime.spawn(async move {
        info!(
            "Starting cache sweeper with interval of {} ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            if stop_flag.load(Ordering::Acquire) {
                break;
            }
            let Some(shared) = shared.upgrade() else {
                debug!("Cache dropped, sweeper exiting");
                break;
            };

            // Passes and listeners are blocking code; keep them off the async workers
            match tokio::task::spawn_blocking(move || sweep(&*shared)).await {
                Ok(0) => debug!("Sweep: no expired entries found"),
                Ok(removed) => info!("Sweep: removed {} expired entries", removed),
                Err(join_error) => {
                    let message = if join_error.is_panic() {
                        CacheError::panic_message(join_error.into_panic().as_ref())
                    } else {
                        join_error.to_string()
                    };
                    let err = CacheError::SweepFailure(message);
                    error!(error = %err, "Sweeper pass failed, continuing at next wake");
                }
            }
        }

        info!("Cache sweeper stopped");
    });

    SweeperSlot::Running { stop, task }
}

/// Runs one pass over the buffer, oldest entry first.
///
/// An entry goes when it has been idle for the expire duration or has lived
/// for the refresh duration. Removed values are handed to the remove listener
/// after the buffer lock is released. Returns the number removed.
pub(crate) fn sweep<V>(shared: &Shared<V>) -> usize
where
    V: Send + 'static,
{
    let timing = *shared.timing.read();
    let now = Instant::now();

    let removed = {
        let mut buffer = shared.buffer.lock();
        let removed = buffer.remove_where(|entry| {
            entry.is_expired(now, timing.expire) || entry.needs_refresh(now, timing.refresh)
        });
        buffer.stats_mut().record_expirations(removed.len());
        buffer.shrink();
        removed
    };

    let count = removed.len();
    let listener = shared.listener.read().clone();
    if let Some(listener) = listener {
        for value in removed {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(value))) {
                let err = CacheError::ListenerFailure(CacheError::panic_message(payload.as_ref()));
                error!(error = %err, "Remove listener failed");
            }
        }
    }
    count
}
