//! Sliding-window rate limiter (§5 "Rate limits"): `(now − 60s, now]`, never
//! a tumbling bucket (see `DESIGN.md` Open Question 3). Hits older than the
//! window are pruned on every check, so the window slides continuously
//! rather than resetting at fixed boundaries.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Duration;
use kernel_core::constants::{DEFAULT_RATE_LIMIT_MAX_PER_WINDOW, RATE_LIMIT_WINDOW_SECS};
use kernel_core::types::Timestamp;

/// Per-key (connector or tenant) sliding-window hit tracker.
pub struct RateLimiter {
    max_per_window: u32,
    hits: Mutex<HashMap<String, Vec<Timestamp>>>,
}

impl RateLimiter {
    pub fn new(max_per_window: u32) -> Self {
        Self { max_per_window, hits: Mutex::new(HashMap::new()) }
    }

    /// Prune hits outside `(now - window, now]`, then admit if the
    /// remaining count is still under the limit. Returns `true` if `now`
    /// was admitted as a new hit.
    pub fn check(&self, key: &str, now: Timestamp) -> bool {
        let window_start = now - Duration::seconds(RATE_LIMIT_WINDOW_SECS);
        let mut hits = self.hits.lock().expect("rate limiter mutex poisoned");
        let entry = hits.entry(key.to_string()).or_default();
        entry.retain(|t| *t > window_start && *t <= now);
        if entry.len() as u32 >= self.max_per_window {
            return false;
        }
        entry.push(now);
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_MAX_PER_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn admits_up_to_the_limit() {
        let rl = RateLimiter::new(3);
        let now = Utc::now();
        assert!(rl.check("tenant-a", now));
        assert!(rl.check("tenant-a", now));
        assert!(rl.check("tenant-a", now));
        assert!(!rl.check("tenant-a", now), "fourth hit in the same instant must be denied");
    }

    #[test]
    fn window_slides_out_old_hits() {
        let rl = RateLimiter::new(1);
        let t0 = Utc::now();
        assert!(rl.check("tenant-a", t0));
        assert!(!rl.check("tenant-a", t0));
        let later = t0 + Duration::seconds(RATE_LIMIT_WINDOW_SECS + 1);
        assert!(rl.check("tenant-a", later), "hit outside the window must no longer count");
    }

    #[test]
    fn keys_are_independent() {
        let rl = RateLimiter::new(1);
        let now = Utc::now();
        assert!(rl.check("tenant-a", now));
        assert!(rl.check("tenant-b", now));
    }
}
