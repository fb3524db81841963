use log::trace;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

/// Minimum-interval gate shared by all workers of a run.
///
/// Only spacing between successive `acquire` returns is guaranteed; waiters
/// are served in lock order, not by priority.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Option<Duration>,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `calls_per_second <= 0` disables waiting
    pub fn new(calls_per_second: f64) -> Self {
        let min_interval = if calls_per_second > 0.0 && calls_per_second.is_finite() {
            Some(Duration::from_secs_f64(1.0 / calls_per_second))
        } else {
            None
        };

        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval
    }

    /// Wait until the minimum interval since the previous call has passed
    pub async fn acquire(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };

        // The lock is held while sleeping so concurrent callers queue up behind it
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let next = previous + interval;
            if next > Instant::now() {
                trace!("Rate limiter waiting {:?}", next - Instant::now());
                sleep_until(next).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
