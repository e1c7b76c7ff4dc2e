use serde::{Deserialize, Serialize};

use crate::receipt::Receipt;
use crate::types::{ObligationId, Timestamp};

/// Obligation lifecycle state. Terminal states (`Satisfied`, `Escalated`)
/// never transition further; `is_terminal` mirrors the `TimeLockStatus`/
/// `RecoveryState` `is_terminal()` convention this state machine is modeled
/// after.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObligationStatus {
    Pending,
    Active,
    Satisfied,
    Failed,
    Escalated,
}

impl ObligationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ObligationStatus::Satisfied | ObligationStatus::Escalated)
    }
}

/// One recorded attempt at satisfying an obligation. Attempts are
/// append-only — a `fail()` call appends, it never overwrites.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attempt {
    pub worker_id: String,
    pub failed_at: Timestamp,
    pub error: String,
}

/// A durable unit of work with a cooperative advisory lease. See
/// `spec.md` §3 Obligation and §4.9.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Obligation {
    pub id: ObligationId,
    #[serde(default)]
    pub goal_spec: String,
    pub status: ObligationStatus,
    pub lease_holder: Option<String>,
    pub lease_expiry: Option<Timestamp>,
    #[serde(default)]
    pub attempts: Vec<Attempt>,
    pub result_receipt: Option<Receipt>,
}

impl Obligation {
    pub fn new(id: ObligationId, goal_spec: impl Into<String>) -> Self {
        Self {
            id,
            goal_spec: goal_spec.into(),
            status: ObligationStatus::Pending,
            lease_holder: None,
            lease_expiry: None,
            attempts: Vec::new(),
            result_receipt: None,
        }
    }

    /// Whether `lease()` may currently claim this obligation: PENDING, or
    /// ACTIVE with an expired lease.
    pub fn is_leasable(&self, now: Timestamp) -> bool {
        match self.status {
            ObligationStatus::Pending => true,
            ObligationStatus::Active => self.lease_expiry.map(|exp| exp < now).unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn fresh_obligation_is_leasable() {
        let ob = Obligation::new(ObligationId::new("ob-1"), "goal");
        assert!(ob.is_leasable(Utc::now()));
    }

    #[test]
    fn active_with_expired_lease_is_leasable() {
        let mut ob = Obligation::new(ObligationId::new("ob-1"), "goal");
        ob.status = ObligationStatus::Active;
        ob.lease_expiry = Some(Utc::now() - Duration::seconds(1));
        assert!(ob.is_leasable(Utc::now()));
    }

    #[test]
    fn active_with_live_lease_is_not_leasable() {
        let mut ob = Obligation::new(ObligationId::new("ob-1"), "goal");
        ob.status = ObligationStatus::Active;
        ob.lease_expiry = Some(Utc::now() + Duration::seconds(30));
        assert!(!ob.is_leasable(Utc::now()));
    }

    #[test]
    fn satisfied_and_escalated_are_terminal() {
        assert!(ObligationStatus::Satisfied.is_terminal());
        assert!(ObligationStatus::Escalated.is_terminal());
        assert!(!ObligationStatus::Pending.is_terminal());
    }
}
