use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};

/// Recurring timer behind the live clock on the task screen.
///
/// The timer exists only while the ticker is alive: dropping it (when the
/// screen is torn down) releases the underlying channel, so no callback
/// outlives the view.
#[derive(Debug)]
pub struct ClockTicker {
    ticks: Receiver<Instant>,
    interval: Duration,
}

impl ClockTicker {
    pub fn start(interval: Duration) -> Self {
        tracing::debug!(?interval, "clock ticker started");
        Self {
            ticks: crossbeam_channel::tick(interval),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drains pending ticks; true when at least one fired since the last call.
    pub fn poll(&self) -> bool {
        let mut fired = false;
        loop {
            match self.ticks.try_recv() {
                Ok(_) => fired = true,
                Err(TryRecvError::Empty) => return fired,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("clock tick channel disconnected");
                    return fired;
                }
            }
        }
    }
}

impl Drop for ClockTicker {
    fn drop(&mut self) {
        tracing::debug!("clock ticker stopped");
    }
}
