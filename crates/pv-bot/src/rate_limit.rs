use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// At most one accepted message per user per `interval`.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_seen: Mutex<HashMap<i64, Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_seen: Mutex::new(HashMap::new()) }
    }

    pub fn from_secs(secs: f64) -> Self {
        Self::new(Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO))
    }

    /// `Ok` records the message; `Err(n)` means wait about `n` more seconds.
    /// Rejected messages do not push the window forward.
    pub fn check(&self, user_id: i64) -> Result<(), u64> {
        let now = Instant::now();
        let mut last_seen = self.last_seen.lock();
        if let Some(prev) = last_seen.get(&user_id) {
            let elapsed = now.duration_since(*prev);
            if elapsed < self.interval {
                let wait = (self.interval - elapsed).as_secs() + 1;
                tracing::warn!(user_id, elapsed_ms = elapsed.as_millis() as u64, "rate limit exceeded");
                return Err(wait);
            }
        }
        last_seen.insert(user_id, now);
        Ok(())
    }

    /// Drop entries older than the interval.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut last_seen = self.last_seen.lock();
        let before = last_seen.len();
        last_seen.retain(|_, at| now.duration_since(*at) < self.interval);
        before - last_seen.len()
    }
}
