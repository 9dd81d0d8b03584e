// src/services/rate_limit.rs

//! Minimum-interval gate for outbound API calls.

use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Enforces a minimum delay between consecutive calls.
///
/// Measured on a monotonic clock from the previous call. One caller only.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Sleep until the interval since the last call has elapsed, then mark
    /// a new call.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                log::debug!("Rate limiting: sleeping {}ms", remaining.as_millis());
                sleep(remaining).await;
            }
        }
        self.last_call = Some(Instant::now());
    }
}
