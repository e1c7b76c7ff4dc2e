//! Read-only obligation lookups, grounded on the teacher's
//! `TimeLockQuery<'a>` (`query(db) -> get/is_matured/describe`) shape.

use kernel_core::types::{ObligationId, Timestamp};
use kernel_core::{KernelError, Obligation, ObligationStatus};
use kernel_store::Store;

pub struct ObligationQuery<'a> {
    store: &'a Store,
}

impl<'a> ObligationQuery<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn get(&self, id: &ObligationId) -> Result<Option<Obligation>, KernelError> {
        self.store.get_obligation(id)
    }

    /// Whether `id`'s current lease, if any, has expired as of `now`.
    pub fn is_lease_expired(&self, id: &ObligationId, now: Timestamp) -> Result<bool, KernelError> {
        let obligation = self.require(id)?;
        Ok(obligation.lease_expiry.map(|expiry| expiry < now).unwrap_or(false))
    }

    pub fn escalated(&self) -> Result<Vec<Obligation>, KernelError> {
        Ok(self
            .store
            .iter_obligations()?
            .into_iter()
            .filter(|o| o.status == ObligationStatus::Escalated)
            .collect())
    }

    pub fn leasable(&self, now: Timestamp) -> Result<Vec<Obligation>, KernelError> {
        Ok(self
            .store
            .iter_obligations()?
            .into_iter()
            .filter(|o| o.is_leasable(now))
            .collect())
    }

    /// A short human-readable summary of an obligation's current state.
    pub fn describe(&self, id: &ObligationId) -> Result<String, KernelError> {
        let obligation = self.require(id)?;
        let state = match obligation.status {
            ObligationStatus::Pending => "pending".to_string(),
            ObligationStatus::Active => format!(
                "active, leased by {}",
                obligation.lease_holder.as_deref().unwrap_or("<unknown>")
            ),
            ObligationStatus::Satisfied => "satisfied".to_string(),
            ObligationStatus::Failed => "failed".to_string(),
            ObligationStatus::Escalated => {
                format!("escalated after {} attempt(s)", obligation.attempts.len())
            }
        };
        Ok(format!("{} \"{}\": {}", obligation.id, obligation.goal_spec, state))
    }

    fn require(&self, id: &ObligationId) -> Result<Obligation, KernelError> {
        self.store
            .get_obligation(id)?
            .ok_or_else(|| KernelError::NotFound(format!("obligation {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn describe_reports_pending_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path()).expect("open store");
        let id = ObligationId::new("ob-1");
        store.put_obligation(&Obligation::new(id.clone(), "ship the report")).unwrap();

        let query = ObligationQuery::new(&store);
        let summary = query.describe(&id).unwrap();
        assert!(summary.contains("pending"));
    }

    #[test]
    fn escalated_filters_to_escalated_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path()).expect("open store");

        let mut escalated = Obligation::new(ObligationId::new("ob-escalated"), "goal");
        escalated.status = ObligationStatus::Escalated;
        store.put_obligation(&escalated).unwrap();
        store.put_obligation(&Obligation::new(ObligationId::new("ob-pending"), "goal")).unwrap();

        let query = ObligationQuery::new(&store);
        let found = query.escalated().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, escalated.id);
    }

    #[test]
    fn lease_expiry_check_reflects_stored_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path()).expect("open store");
        let id = ObligationId::new("ob-1");
        let now = Utc::now();

        let mut obligation = Obligation::new(id.clone(), "goal");
        obligation.status = ObligationStatus::Active;
        obligation.lease_expiry = Some(now - chrono::Duration::seconds(5));
        store.put_obligation(&obligation).unwrap();

        let query = ObligationQuery::new(&store);
        assert!(query.is_lease_expired(&id, now).unwrap());
    }
}
