use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::domain::UpstreamClass;

/// Spaces out requests per upstream class.
///
/// The only state shared between concurrent fetch tasks.
pub struct RateLimiter {
    delay: Duration,
    next_slot: Mutex<HashMap<UpstreamClass, Instant>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Claim the next request slot for `class` and return how long the
    /// caller must wait for it. Claiming is atomic; waiting is not.
    fn reserve(&self, class: UpstreamClass) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }

        let now = Instant::now();
        let mut slots = self
            .next_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let slot = match slots.get(&class) {
            Some(previous) => (*previous + self.delay).max(now),
            None => now,
        };
        slots.insert(class, slot);

        slot.saturating_duration_since(now)
    }

    /// Wait until a request of `class` may be sent.
    pub async fn acquire(&self, class: UpstreamClass) {
        let wait = self.reserve(class);
        if !wait.is_zero() {
            tracing::trace!(?class, wait_ms = wait.as_millis() as u64, "rate limit wait");
            sleep(wait).await;
        }
    }
}
