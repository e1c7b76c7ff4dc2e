use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DAILY_LIMIT, DEFAULT_MONTHLY_LIMIT};
use crate::types::Timestamp;

/// Per-tenant usage quota. Period rollovers are computed relative to UTC
/// day/month boundaries on every check — `daily_used`/`monthly_used` are
/// reset lazily by the checking code, not by a background job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Budget {
    pub tenant_id: String,
    #[serde(default)]
    pub daily_used: i64,
    #[serde(default = "default_daily_limit")]
    pub daily_limit: i64,
    #[serde(default)]
    pub monthly_used: i64,
    #[serde(default = "default_monthly_limit")]
    pub monthly_limit: i64,
    pub last_updated: Timestamp,
}

fn default_daily_limit() -> i64 {
    DEFAULT_DAILY_LIMIT
}

fn default_monthly_limit() -> i64 {
    DEFAULT_MONTHLY_LIMIT
}

impl Budget {
    pub fn new(tenant_id: impl Into<String>, now: Timestamp) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            daily_used: 0,
            daily_limit: DEFAULT_DAILY_LIMIT,
            monthly_used: 0,
            monthly_limit: DEFAULT_MONTHLY_LIMIT,
            last_updated: now,
        }
    }

    /// Roll `daily_used`/`monthly_used` back to zero if `now` has crossed a
    /// UTC day/month boundary since `last_updated`.
    pub fn roll_over(&mut self, now: Timestamp) {
        use chrono::Datelike;
        if now.date_naive() != self.last_updated.date_naive() {
            self.daily_used = 0;
        }
        if now.year() != self.last_updated.year() || now.month() != self.last_updated.month() {
            self.monthly_used = 0;
        }
        self.last_updated = now;
    }

    /// Whether reserving `cost` would push either window over its limit.
    pub fn would_exceed(&self, cost: i64) -> bool {
        self.daily_used + cost > self.daily_limit || self.monthly_used + cost > self.monthly_limit
    }

    pub fn reserve(&mut self, cost: i64) {
        self.daily_used += cost;
        self.monthly_used += cost;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn fresh_budget_does_not_exceed() {
        let b = Budget::new("tenant-a", Utc::now());
        assert!(!b.would_exceed(1));
    }

    #[test]
    fn exact_limit_is_exceeded_by_one_more() {
        let mut b = Budget::new("tenant-a", Utc::now());
        b.daily_limit = 10;
        b.daily_used = 10;
        assert!(b.would_exceed(1));
    }

    #[test]
    fn roll_over_resets_daily_on_new_day() {
        let mut b = Budget::new("tenant-a", Utc::now() - Duration::days(1));
        b.daily_used = 5;
        b.roll_over(Utc::now());
        assert_eq!(b.daily_used, 0);
    }
}
