//! Read-only ledger lookups, grounded on the same shape as
//! `kernel_obligations::ObligationQuery` and `kernel_tape::TapeQuery`:
//! a thin borrow over the store that never mutates it.

use kernel_core::types::Sequence;
use kernel_core::{KernelError, LedgerEntry, LedgerType};

use crate::db::Store;

pub struct LedgerQuery<'a> {
    store: &'a Store,
}

impl<'a> LedgerQuery<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn entries(&self, ledger_type: LedgerType) -> Result<Vec<LedgerEntry>, KernelError> {
        self.store.iter_ledger(ledger_type)
    }

    pub fn get(&self, ledger_type: LedgerType, sequence: Sequence) -> Result<Option<LedgerEntry>, KernelError> {
        Ok(self.entries(ledger_type)?.into_iter().find(|e| e.sequence == sequence))
    }

    pub fn head(&self, ledger_type: LedgerType) -> Result<Option<LedgerEntry>, KernelError> {
        Ok(self.entries(ledger_type)?.into_iter().last())
    }

    pub fn len(&self, ledger_type: LedgerType) -> Result<usize, KernelError> {
        Ok(self.entries(ledger_type)?.len())
    }

    pub fn is_empty(&self, ledger_type: LedgerType) -> Result<bool, KernelError> {
        Ok(self.len(ledger_type)? == 0)
    }

    pub fn describe(&self, ledger_type: LedgerType) -> Result<String, KernelError> {
        match self.head(ledger_type)? {
            Some(head) => Ok(format!("{} entries, head seq {}", self.len(ledger_type)?, head.sequence)),
            None => Ok("0 entries".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kernel_crypto::hash::sha256_hash;

    #[test]
    fn empty_ledger_reports_zero_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path()).expect("open store");
        let query = LedgerQuery::new(&store);
        assert!(query.is_empty(LedgerType::Run).unwrap());
        assert_eq!(query.describe(LedgerType::Run).unwrap(), "0 entries");
    }

    #[test]
    fn head_reflects_the_most_recently_appended_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path()).expect("open store");
        store.append_ledger(LedgerType::Run, "tester", sha256_hash(b"one"), Utc::now()).unwrap();
        store.append_ledger(LedgerType::Run, "tester", sha256_hash(b"two"), Utc::now()).unwrap();

        let query = LedgerQuery::new(&store);
        let head = query.head(LedgerType::Run).unwrap().expect("head entry");
        assert_eq!(head.payload_hash, sha256_hash(b"two"));
        assert_eq!(query.len(LedgerType::Run).unwrap(), 2);
    }

    #[test]
    fn ledgers_of_different_types_do_not_cross_contaminate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path()).expect("open store");
        store.append_ledger(LedgerType::Policy, "tester", sha256_hash(b"policy"), Utc::now()).unwrap();

        let query = LedgerQuery::new(&store);
        assert!(query.is_empty(LedgerType::Run).unwrap());
        assert_eq!(query.len(LedgerType::Policy).unwrap(), 1);
    }
}
