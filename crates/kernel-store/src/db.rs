use std::path::Path;

use kernel_core::types::{DecisionId, ObligationId, ReceiptId, SessionId, Timestamp};
use kernel_core::{Budget, KernelError, LedgerEntry, LedgerType, Obligation, Receipt};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use tracing::debug;

use crate::outbox::{OutboxEntry, OutboxStatus};

/// Persistent storage for the governance kernel, backed by sled.
///
/// Named trees:
///   ledger_release / ledger_policy / ledger_run / ledger_evidence
///                      — be-u64(seq)      → bincode(LedgerEntry)
///   outbox             — decision_id bytes → bincode(OutboxEntry)
///   budgets            — tenant_id bytes   → bincode(Budget)
///   obligations        — obligation_id     → bincode(Obligation)
///   receipts           — receipt_id        → bincode(Receipt)
///   session_heads      — session_id        → bincode((ContentHash, LamportClock))
///   ledger_meta        — ledger_type str   → bincode((Sequence, ContentHash-as-String))
pub struct Store {
    _db: sled::Db,
    ledger_release: sled::Tree,
    ledger_policy: sled::Tree,
    ledger_run: sled::Tree,
    ledger_evidence: sled::Tree,
    ledger_meta: sled::Tree,
    outbox: sled::Tree,
    budgets: sled::Tree,
    obligations: sled::Tree,
    receipts: sled::Tree,
    session_heads: sled::Tree,
}

fn storage_err(e: impl std::fmt::Display) -> KernelError {
    KernelError::Storage(e.to_string())
}

fn serialize_err(e: impl std::fmt::Display) -> KernelError {
    KernelError::Serialization(e.to_string())
}

impl Store {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KernelError> {
        let db = sled::open(path).map_err(storage_err)?;
        let ledger_release = db.open_tree("ledger_release").map_err(storage_err)?;
        let ledger_policy = db.open_tree("ledger_policy").map_err(storage_err)?;
        let ledger_run = db.open_tree("ledger_run").map_err(storage_err)?;
        let ledger_evidence = db.open_tree("ledger_evidence").map_err(storage_err)?;
        let ledger_meta = db.open_tree("ledger_meta").map_err(storage_err)?;
        let outbox = db.open_tree("outbox").map_err(storage_err)?;
        let budgets = db.open_tree("budgets").map_err(storage_err)?;
        let obligations = db.open_tree("obligations").map_err(storage_err)?;
        let receipts = db.open_tree("receipts").map_err(storage_err)?;
        let session_heads = db.open_tree("session_heads").map_err(storage_err)?;
        Ok(Self {
            _db: db,
            ledger_release,
            ledger_policy,
            ledger_run,
            ledger_evidence,
            ledger_meta,
            outbox,
            budgets,
            obligations,
            receipts,
            session_heads,
        })
    }

    fn ledger_tree(&self, ledger_type: LedgerType) -> &sled::Tree {
        match ledger_type {
            LedgerType::Release => &self.ledger_release,
            LedgerType::Policy => &self.ledger_policy,
            LedgerType::Run => &self.ledger_run,
            LedgerType::Evidence => &self.ledger_evidence,
        }
    }

    // ── Hash-chained ledgers (§4.4) ───────────────────────────────────────────

    /// Append the next entry to `ledger_type`. Sequence assignment, prev-hash
    /// lookup, and insertion happen inside a single sled transaction so a
    /// concurrent appender never observes a torn state.
    pub fn append_ledger(
        &self,
        ledger_type: LedgerType,
        author: impl Into<String>,
        payload_hash: kernel_core::ContentHash,
        now: Timestamp,
    ) -> Result<LedgerEntry, KernelError> {
        let author = author.into();
        let tree = self.ledger_tree(ledger_type).clone();
        let meta_key = ledger_type.as_str().as_bytes();
        let result = (&tree, &self.ledger_meta).transaction(|(tx_tree, tx_meta)| {
            let last = tx_meta.get(meta_key)?;
            let (sequence, prev_hash) = match last {
                Some(bytes) => {
                    let (seq, hash): (u64, String) = bincode::deserialize(&bytes)
                        .map_err(|e| ConflictableTransactionError::Abort(serialize_err(e)))?;
                    (seq + 1, hash)
                }
                None => (1, kernel_core::ContentHash::GENESIS.to_string()),
            };
            let content_hash =
                kernel_crypto::ledger_entry_hash(sequence, ledger_type.as_str(), &payload_hash, &prev_hash);
            let entry = LedgerEntry {
                sequence,
                entry_type: ledger_type,
                payload_hash: payload_hash.clone(),
                prev_hash,
                content_hash: content_hash.clone(),
                timestamp: now,
                author: author.clone(),
            };
            let entry_bytes = bincode::serialize(&entry)
                .map_err(|e| ConflictableTransactionError::Abort(serialize_err(e)))?;
            tx_tree.insert(&sequence.to_be_bytes(), entry_bytes)?;

            let meta_bytes = bincode::serialize(&(sequence, content_hash.to_string()))
                .map_err(|e| ConflictableTransactionError::Abort(serialize_err(e)))?;
            tx_meta.insert(meta_key, meta_bytes)?;
            Ok(entry)
        });
        result.map_err(|e: TransactionError<KernelError>| match e {
            TransactionError::Abort(ke) => ke,
            TransactionError::Storage(se) => storage_err(se),
        })
    }

    pub fn iter_ledger(&self, ledger_type: LedgerType) -> Result<Vec<LedgerEntry>, KernelError> {
        let mut out = Vec::new();
        for item in self.ledger_tree(ledger_type).iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(serialize_err)?);
        }
        Ok(out)
    }

    /// Walk the ledger from sequence 1, recomputing each entry's hash and
    /// checking prev-links. Returns the first broken sequence, if any.
    pub fn verify_ledger(&self, ledger_type: LedgerType) -> Result<(), KernelError> {
        let entries = self.iter_ledger(ledger_type)?;
        let mut prev_hash = kernel_core::ContentHash::GENESIS.to_string();
        for entry in &entries {
            if entry.prev_hash != prev_hash {
                return Err(KernelError::ChainBroken { at: entry.sequence });
            }
            let recomputed = kernel_crypto::ledger_entry_hash(
                entry.sequence,
                entry.entry_type.as_str(),
                &entry.payload_hash,
                &entry.prev_hash,
            );
            if recomputed != entry.content_hash {
                return Err(KernelError::ChainBroken { at: entry.sequence });
            }
            prev_hash = entry.content_hash.to_string();
        }
        Ok(())
    }

    // ── Outbox (§4.7) ──────────────────────────────────────────────────────────

    /// Schedule an effect for dispatch. Idempotent on `decision_id`: scheduling
    /// twice for the same decision is a no-op on the second call.
    pub fn schedule(&self, entry: OutboxEntry) -> Result<(), KernelError> {
        let key = entry.decision_id.as_str().as_bytes();
        if self.outbox.contains_key(key).map_err(storage_err)? {
            debug!(decision_id = %entry.decision_id, "outbox schedule is a duplicate, ignoring");
            return Ok(());
        }
        let bytes = bincode::serialize(&entry).map_err(serialize_err)?;
        self.outbox.insert(key, bytes).map_err(storage_err)?;
        Ok(())
    }

    pub fn get_outbox_entry(&self, decision_id: &DecisionId) -> Result<Option<OutboxEntry>, KernelError> {
        match self.outbox.get(decision_id.as_str().as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(serialize_err)?)),
            None => Ok(None),
        }
    }

    /// All PENDING entries, ordered by `scheduled_at`.
    pub fn get_pending(&self) -> Result<Vec<OutboxEntry>, KernelError> {
        let mut out = Vec::new();
        for item in self.outbox.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            let entry: OutboxEntry = bincode::deserialize(&bytes).map_err(serialize_err)?;
            if entry.status == OutboxStatus::Pending {
                out.push(entry);
            }
        }
        out.sort_by_key(|e| e.scheduled_at);
        Ok(out)
    }

    pub fn mark_done(&self, decision_id: &DecisionId) -> Result<(), KernelError> {
        let key = decision_id.as_str().as_bytes();
        let mut entry = self
            .get_outbox_entry(decision_id)?
            .ok_or_else(|| KernelError::NotFound(format!("outbox entry {decision_id}")))?;
        entry.status = OutboxStatus::Done;
        let bytes = bincode::serialize(&entry).map_err(serialize_err)?;
        self.outbox.insert(key, bytes).map_err(storage_err)?;
        Ok(())
    }

    // ── Receipts + Outbox atomic pairing (§5 "Atomicity") ────────────────────

    /// Persist `receipt` and mark the outbox entry for `decision_id` DONE as
    /// one atomic pair: both commit, or neither does.
    pub fn commit_receipt_and_mark_done(
        &self,
        receipt: &Receipt,
        decision_id: &DecisionId,
    ) -> Result<(), KernelError> {
        let result = (&self.receipts, &self.outbox).transaction(|(tx_receipts, tx_outbox)| {
            let outbox_key = decision_id.as_str().as_bytes();
            let existing = tx_outbox.get(outbox_key)?.ok_or_else(|| {
                ConflictableTransactionError::Abort(KernelError::NotFound(format!(
                    "outbox entry {decision_id}"
                )))
            })?;
            let mut entry: OutboxEntry = bincode::deserialize(&existing)
                .map_err(|e| ConflictableTransactionError::Abort(serialize_err(e)))?;
            entry.status = OutboxStatus::Done;
            let entry_bytes = bincode::serialize(&entry)
                .map_err(|e| ConflictableTransactionError::Abort(serialize_err(e)))?;
            tx_outbox.insert(outbox_key, entry_bytes)?;

            let receipt_bytes = bincode::serialize(receipt)
                .map_err(|e| ConflictableTransactionError::Abort(serialize_err(e)))?;
            tx_receipts.insert(receipt.receipt_id.as_str().as_bytes(), receipt_bytes)?;
            Ok(())
        });
        result.map_err(|e: TransactionError<KernelError>| match e {
            TransactionError::Abort(ke) => ke,
            TransactionError::Storage(se) => storage_err(se),
        })?;

        let head_bytes = bincode::serialize(&(receipt.content_hash(), receipt.lamport_clock))
            .map_err(serialize_err)?;
        self.session_heads
            .insert(receipt.session_id.as_str().as_bytes(), head_bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn get_receipt(&self, receipt_id: &ReceiptId) -> Result<Option<Receipt>, KernelError> {
        match self.receipts.get(receipt_id.as_str().as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(serialize_err)?)),
            None => Ok(None),
        }
    }

    pub fn iter_receipts(&self) -> Result<Vec<Receipt>, KernelError> {
        let mut out = Vec::new();
        for item in self.receipts.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(serialize_err)?);
        }
        Ok(out)
    }

    /// The `(content_hash, lamport_clock)` of the last Receipt persisted for
    /// `session_id`, or `None` for a session with no Receipts yet.
    pub fn session_head(&self, session_id: &SessionId) -> Result<Option<(kernel_core::ContentHash, u64)>, KernelError> {
        match self.session_heads.get(session_id.as_str().as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(serialize_err)?)),
            None => Ok(None),
        }
    }

    // ── Budget store (§4.6 step 2) ────────────────────────────────────────────

    pub fn get_budget(&self, tenant_id: &str) -> Result<Option<Budget>, KernelError> {
        match self.budgets.get(tenant_id.as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(serialize_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_budget(&self, budget: &Budget) -> Result<(), KernelError> {
        let bytes = bincode::serialize(budget).map_err(serialize_err)?;
        self.budgets.insert(budget.tenant_id.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    /// Roll over and reserve `cost` against `tenant_id`'s budget as one
    /// atomic read-modify-write. Returns `Err` (and reserves nothing) if the
    /// reservation would exceed either window — callers must treat any
    /// storage error here as fail-closed per §4.6.
    pub fn reserve_budget(&self, tenant_id: &str, cost: i64, now: Timestamp) -> Result<Budget, KernelError> {
        let result = self.budgets.transaction(|tx_tree| {
            let key = tenant_id.as_bytes();
            let mut budget = match tx_tree.get(key)? {
                Some(bytes) => bincode::deserialize(&bytes)
                    .map_err(|e| ConflictableTransactionError::Abort(serialize_err(e)))?,
                None => Budget::new(tenant_id, now),
            };
            budget.roll_over(now);
            if budget.would_exceed(cost) {
                return Err(ConflictableTransactionError::Abort(KernelError::Other(
                    "budget would exceed limit".to_string(),
                )));
            }
            budget.reserve(cost);
            let bytes = bincode::serialize(&budget)
                .map_err(|e| ConflictableTransactionError::Abort(serialize_err(e)))?;
            tx_tree.insert(key, bytes)?;
            Ok(budget)
        });
        result.map_err(|e: TransactionError<KernelError>| match e {
            TransactionError::Abort(ke) => ke,
            TransactionError::Storage(se) => storage_err(se),
        })
    }

    // ── Obligation store (§4.9) ───────────────────────────────────────────────

    pub fn get_obligation(&self, id: &ObligationId) -> Result<Option<Obligation>, KernelError> {
        match self.obligations.get(id.as_str().as_bytes()).map_err(storage_err)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes).map_err(serialize_err)?)),
            None => Ok(None),
        }
    }

    pub fn put_obligation(&self, obligation: &Obligation) -> Result<(), KernelError> {
        let bytes = bincode::serialize(obligation).map_err(serialize_err)?;
        self.obligations
            .insert(obligation.id.as_str().as_bytes(), bytes)
            .map_err(storage_err)?;
        Ok(())
    }

    pub fn iter_obligations(&self) -> Result<Vec<Obligation>, KernelError> {
        let mut out = Vec::new();
        for item in self.obligations.iter() {
            let (_, bytes) = item.map_err(storage_err)?;
            out.push(bincode::deserialize(&bytes).map_err(serialize_err)?);
        }
        Ok(out)
    }

    /// Atomically replace an obligation, but only if its stored state still
    /// matches `expected_status` — the compare-and-swap primitive
    /// `lease()`/`complete()`/`fail()` build on to guarantee at most one
    /// worker wins a given candidate under concurrent calls.
    pub fn cas_obligation(
        &self,
        id: &ObligationId,
        expected_status: kernel_core::ObligationStatus,
        mutate: impl FnOnce(&mut Obligation),
    ) -> Result<Option<Obligation>, KernelError> {
        let result = self.obligations.transaction(|tx_tree| {
            let key = id.as_str().as_bytes();
            let Some(bytes) = tx_tree.get(key)? else {
                return Ok(None);
            };
            let mut obligation: Obligation = bincode::deserialize(&bytes)
                .map_err(|e| ConflictableTransactionError::Abort(serialize_err(e)))?;
            if obligation.status != expected_status {
                return Ok(None);
            }
            mutate(&mut obligation);
            let bytes = bincode::serialize(&obligation)
                .map_err(|e| ConflictableTransactionError::Abort(serialize_err(e)))?;
            tx_tree.insert(key, bytes)?;
            Ok(Some(obligation))
        });
        result.map_err(|e: TransactionError<KernelError>| match e {
            TransactionError::Abort(ke) => ke,
            TransactionError::Storage(se) => storage_err(se),
        })
    }

    pub fn flush(&self) -> Result<(), KernelError> {
        self._db.flush().map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_core::Canonical;
    use serde_json::json;

    fn temp_store() -> Store {
        let dir = tempfile::tempdir().expect("tempdir");
        Store::open(dir.path()).expect("open store")
    }

    fn hash(label: &str) -> kernel_core::ContentHash {
        Canonical::normalize(&json!({ "label": label })).unwrap().content_hash()
    }

    #[test]
    fn first_ledger_append_chains_from_genesis() {
        let store = temp_store();
        let entry = store
            .append_ledger(LedgerType::Run, "guardian", hash("e1"), chrono::Utc::now())
            .unwrap();
        assert_eq!(entry.sequence, 1);
        assert_eq!(entry.prev_hash, kernel_core::ContentHash::GENESIS);
    }

    #[test]
    fn ledger_verify_passes_for_untampered_chain() {
        let store = temp_store();
        for i in 0..5 {
            store
                .append_ledger(LedgerType::Run, "guardian", hash(&format!("e{i}")), chrono::Utc::now())
                .unwrap();
        }
        assert!(store.verify_ledger(LedgerType::Run).is_ok());
    }

    #[test]
    fn ledger_verify_detects_tampered_payload() {
        let store = temp_store();
        for i in 0..3 {
            store
                .append_ledger(LedgerType::Run, "guardian", hash(&format!("e{i}")), chrono::Utc::now())
                .unwrap();
        }
        let mut entries = store.iter_ledger(LedgerType::Run).unwrap();
        entries[1].payload_hash = hash("tampered");
        let bytes = bincode::serialize(&entries[1]).unwrap();
        store
            .ledger_run
            .insert(&entries[1].sequence.to_be_bytes(), bytes)
            .unwrap();
        let err = store.verify_ledger(LedgerType::Run).unwrap_err();
        assert!(matches!(err, KernelError::ChainBroken { at: 2 }));
    }

    #[test]
    fn outbox_schedule_is_idempotent_on_decision_id() {
        let store = temp_store();
        let decision_id = DecisionId::new("dec-1");
        let entry = OutboxEntry::new(decision_id.clone(), hash("effect"), chrono::Utc::now());
        store.schedule(entry.clone()).unwrap();
        store.schedule(entry).unwrap();
        assert_eq!(store.get_pending().unwrap().len(), 1);
    }

    #[test]
    fn budget_reservation_is_fail_closed_over_limit() {
        let store = temp_store();
        let now = chrono::Utc::now();
        let mut budget = Budget::new("tenant-a", now);
        budget.daily_limit = 5;
        store.put_budget(&budget).unwrap();
        assert!(store.reserve_budget("tenant-a", 10, now).is_err());
    }
}
