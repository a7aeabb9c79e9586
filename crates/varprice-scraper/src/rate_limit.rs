//! Uniform request spacing for everything that reaches the render capability.
//!
//! A [`RateLimiter`] converts a requests-per-second target into a minimum
//! interval between consecutive operations. There is no burst allowance: the
//! n-th call returns no earlier than `(n - 1) / rate` seconds after the first.
//!
//! Cloning a limiter shares its state, so every clone draws from the same
//! schedule. That is how a host bounds aggregate traffic to one origin across
//! several workers. Independent limits come from separate [`RateLimiter::new`]
//! calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `requests_per_second` operations per second.
    ///
    /// `requests_per_second` must already be validated as positive and finite
    /// (see `varprice_core::config`); a non-positive value degrades to no
    /// spacing rather than panicking.
    #[must_use]
    pub fn new(requests_per_second: f64) -> Self {
        let min_interval = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self::with_interval(min_interval)
    }

    #[must_use]
    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Suspends for `max(0, interval - elapsed_since_last_call)` and records
    /// the new call time. Never fails.
    ///
    /// The lock is held across the sleep so concurrent callers sharing this
    /// limiter queue up behind each other instead of all waking together.
    pub async fn throttle(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::trace!(wait_ms = wait.as_millis(), "throttling");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}
