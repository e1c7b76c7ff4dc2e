//! Obligation Engine (§4.9) — create/lease/complete/fail state machine over
//! advisory, cooperative leases. Every mutation goes through
//! `Store::cas_obligation`, which compare-and-swaps on the obligation's last
//! observed `status`: a worker that read a stale status loses the race and
//! gets back `None`, which this module turns into `LeaseConflict` rather than
//! silently clobbering a concurrent winner.

use std::sync::Arc;

use chrono::Duration;
use kernel_core::constants::{DEFAULT_LEASE_DURATION_SECS, DEFAULT_MAX_RETRIES};
use kernel_core::types::{ObligationId, Timestamp};
use kernel_core::{Attempt, Obligation, ObligationStatus, Receipt};
use kernel_store::Store;
use tracing::info;

use crate::error::ObligationError;

pub struct ObligationEngine {
    store: Arc<Store>,
    max_retries: u32,
}

impl ObligationEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, max_retries: DEFAULT_MAX_RETRIES }
    }

    pub fn with_max_retries(store: Arc<Store>, max_retries: u32) -> Self {
        Self { store, max_retries }
    }

    /// Create a new obligation in the PENDING state.
    pub fn create(&self, id: ObligationId, goal_spec: impl Into<String>) -> Result<Obligation, ObligationError> {
        let obligation = Obligation::new(id, goal_spec);
        self.store.put_obligation(&obligation)?;
        info!(obligation_id = %obligation.id, "obligation created");
        Ok(obligation)
    }

    /// Claim an obligation for `worker_id`. Succeeds only if the obligation
    /// is PENDING, or ACTIVE with an expired lease (`Obligation::is_leasable`).
    /// The lease runs `lease_duration` from `now`.
    pub fn lease(
        &self,
        id: &ObligationId,
        worker_id: &str,
        lease_duration: Duration,
        now: Timestamp,
    ) -> Result<Obligation, ObligationError> {
        let current = self.require(id)?;
        if !current.is_leasable(now) {
            return Err(ObligationError::NotLeasable(id.to_string()));
        }

        let holder = worker_id.to_string();
        let expiry = now + lease_duration;
        let result = self.store.cas_obligation(id, current.status, move |ob| {
            ob.status = ObligationStatus::Active;
            ob.lease_holder = Some(holder);
            ob.lease_expiry = Some(expiry);
        })?;

        let leased = result.ok_or_else(|| ObligationError::LeaseConflict(id.to_string()))?;
        info!(obligation_id = %leased.id, worker_id, "obligation leased");
        Ok(leased)
    }

    /// Claim with the default lease duration (§4.9).
    pub fn lease_default(&self, id: &ObligationId, worker_id: &str, now: Timestamp) -> Result<Obligation, ObligationError> {
        self.lease(id, worker_id, Duration::seconds(DEFAULT_LEASE_DURATION_SECS), now)
    }

    /// Mark an obligation SATISFIED and attach its result `Receipt`. Only the
    /// current lease holder may complete it.
    pub fn complete(&self, id: &ObligationId, worker_id: &str, receipt: Receipt) -> Result<Obligation, ObligationError> {
        let current = self.require(id)?;
        self.check_holder(&current, worker_id)?;

        let result = self.store.cas_obligation(id, ObligationStatus::Active, move |ob| {
            ob.status = ObligationStatus::Satisfied;
            ob.result_receipt = Some(receipt);
            ob.lease_holder = None;
            ob.lease_expiry = None;
        })?;

        let done = result.ok_or_else(|| ObligationError::LeaseConflict(id.to_string()))?;
        info!(obligation_id = %done.id, "obligation satisfied");
        Ok(done)
    }

    /// Record a failed attempt. Releases the lease and, below
    /// `max_retries`, returns the obligation to PENDING so another lease can
    /// retry it; at or above `max_retries` it escalates instead.
    pub fn fail(&self, id: &ObligationId, worker_id: &str, error: impl Into<String>, now: Timestamp) -> Result<Obligation, ObligationError> {
        let current = self.require(id)?;
        self.check_holder(&current, worker_id)?;

        let worker_id = worker_id.to_string();
        let error = error.into();
        let max_retries = self.max_retries;
        let result = self.store.cas_obligation(id, ObligationStatus::Active, move |ob| {
            ob.attempts.push(Attempt { worker_id, failed_at: now, error });
            ob.lease_holder = None;
            ob.lease_expiry = None;
            ob.status = if ob.attempts.len() as u32 >= max_retries {
                ObligationStatus::Escalated
            } else {
                ObligationStatus::Pending
            };
        })?;

        let failed = result.ok_or_else(|| ObligationError::LeaseConflict(id.to_string()))?;
        info!(obligation_id = %failed.id, status = ?failed.status, attempts = failed.attempts.len(), "obligation attempt failed");
        Ok(failed)
    }

    /// Mark an obligation FAILED outright, bypassing the retry ladder — for
    /// a PERMANENT executor error the Obligation Engine has no business
    /// retrying. Distinct from `Escalated`, which means "retries exhausted".
    pub fn abandon(&self, id: &ObligationId, worker_id: &str, error: impl Into<String>, now: Timestamp) -> Result<Obligation, ObligationError> {
        let current = self.require(id)?;
        self.check_holder(&current, worker_id)?;

        let worker_id = worker_id.to_string();
        let error = error.into();
        let result = self.store.cas_obligation(id, ObligationStatus::Active, move |ob| {
            ob.attempts.push(Attempt { worker_id, failed_at: now, error });
            ob.status = ObligationStatus::Failed;
            ob.lease_holder = None;
            ob.lease_expiry = None;
        })?;

        let abandoned = result.ok_or_else(|| ObligationError::LeaseConflict(id.to_string()))?;
        info!(obligation_id = %abandoned.id, "obligation abandoned");
        Ok(abandoned)
    }

    fn require(&self, id: &ObligationId) -> Result<Obligation, ObligationError> {
        self.store
            .get_obligation(id)?
            .ok_or_else(|| ObligationError::NotFound(id.to_string()))
    }

    fn check_holder(&self, obligation: &Obligation, worker_id: &str) -> Result<(), ObligationError> {
        if obligation.status.is_terminal() {
            return Err(ObligationError::AlreadyTerminal(obligation.id.to_string()));
        }
        match &obligation.lease_holder {
            Some(holder) if holder == worker_id => Ok(()),
            _ => Err(ObligationError::NotLeaseHolder(obligation.id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kernel_core::ReceiptStatus;

    fn engine() -> ObligationEngine {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(Store::open(dir.path()).expect("open store"));
        ObligationEngine::new(store)
    }

    fn receipt(id: &ObligationId) -> Receipt {
        Receipt {
            receipt_id: kernel_core::types::ReceiptId::new(format!("rcpt-{id}")),
            decision_id: kernel_core::types::DecisionId::new("dec-1"),
            effect_id: kernel_core::types::EffectId::new("eff-1"),
            status: ReceiptStatus::Success,
            blob_hash: None,
            output_hash: None,
            executor_id: "executor-1".into(),
            session_id: kernel_core::types::SessionId::new("sess-1"),
            prev_hash: None,
            lamport_clock: 0,
            signature: None,
            signer_key_id: None,
            timestamp: Utc::now(),
            tape_refs: vec![],
            failure_reason: None,
        }
    }

    #[test]
    fn fresh_obligation_is_leasable_immediately() {
        let e = engine();
        let id = ObligationId::new("ob-1");
        e.create(id.clone(), "ship the report").unwrap();
        let leased = e.lease_default(&id, "worker-a", Utc::now()).unwrap();
        assert_eq!(leased.status, ObligationStatus::Active);
        assert_eq!(leased.lease_holder.as_deref(), Some("worker-a"));
    }

    #[test]
    fn second_lease_attempt_conflicts_while_held() {
        let e = engine();
        let id = ObligationId::new("ob-1");
        e.create(id.clone(), "goal").unwrap();
        let now = Utc::now();
        e.lease_default(&id, "worker-a", now).unwrap();

        let err = e.lease_default(&id, "worker-b", now).unwrap_err();
        assert!(matches!(err, ObligationError::NotLeasable(_)));
    }

    #[test]
    fn expired_lease_may_be_reclaimed_by_another_worker() {
        let e = engine();
        let id = ObligationId::new("ob-1");
        e.create(id.clone(), "goal").unwrap();
        let now = Utc::now();
        e.lease(&id, "worker-a", Duration::seconds(1), now).unwrap();

        let later = now + Duration::seconds(2);
        let leased = e.lease_default(&id, "worker-b", later).unwrap();
        assert_eq!(leased.lease_holder.as_deref(), Some("worker-b"));
    }

    #[test]
    fn completion_by_the_lease_holder_satisfies_the_obligation() {
        let e = engine();
        let id = ObligationId::new("ob-1");
        e.create(id.clone(), "goal").unwrap();
        e.lease_default(&id, "worker-a", Utc::now()).unwrap();

        let done = e.complete(&id, "worker-a", receipt(&id)).unwrap();
        assert_eq!(done.status, ObligationStatus::Satisfied);
        assert!(done.result_receipt.is_some());
    }

    #[test]
    fn completion_by_a_non_holder_is_rejected() {
        let e = engine();
        let id = ObligationId::new("ob-1");
        e.create(id.clone(), "goal").unwrap();
        e.lease_default(&id, "worker-a", Utc::now()).unwrap();

        let err = e.complete(&id, "worker-b", receipt(&id)).unwrap_err();
        assert!(matches!(err, ObligationError::NotLeaseHolder(_)));
    }

    #[test]
    fn repeated_failure_escalates_after_max_retries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let e = ObligationEngine::with_max_retries(Arc::new(Store::open(dir.path()).unwrap()), 2);
        let id = ObligationId::new("ob-1");
        e.create(id.clone(), "goal").unwrap();

        let now = Utc::now();
        e.lease_default(&id, "worker-a", now).unwrap();
        let after_first = e.fail(&id, "worker-a", "timeout", now).unwrap();
        assert_eq!(after_first.status, ObligationStatus::Pending);

        e.lease_default(&id, "worker-a", now).unwrap();
        let after_second = e.fail(&id, "worker-a", "timeout again", now).unwrap();
        assert_eq!(after_second.status, ObligationStatus::Escalated);
    }

    #[test]
    fn abandon_marks_failed_without_consuming_a_retry_slot() {
        let e = engine();
        let id = ObligationId::new("ob-1");
        e.create(id.clone(), "goal").unwrap();
        e.lease_default(&id, "worker-a", Utc::now()).unwrap();

        let abandoned = e.abandon(&id, "worker-a", "permanent error", Utc::now()).unwrap();
        assert_eq!(abandoned.status, ObligationStatus::Failed);
    }
}
