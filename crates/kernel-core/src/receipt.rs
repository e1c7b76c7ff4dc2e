use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::Canonical;
use crate::types::{ContentHash, DecisionId, EffectId, LamportClock, ReceiptId, SessionId, SignerKeyId, Timestamp};

/// Outcome classification for a Receipt. `COMPENSATED` records that a
/// previously-succeeded effect was later undone by a compensating action;
/// it is still a terminal, durable status — never silently overwritten.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Failure,
    Compensated,
}

/// The durable output of an Effect application. `prev_hash` links to the
/// previous Receipt in the same session; `lamport_clock` is monotonically
/// increasing within a session and never reused (see `spec.md` §3, Open
/// Question 2 — `session_id` is a distinct field from `executor_id`, the
/// latter naming only the component that performed the execution).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: ReceiptId,
    pub decision_id: DecisionId,
    pub effect_id: EffectId,
    pub status: ReceiptStatus,
    pub blob_hash: Option<ContentHash>,
    pub output_hash: Option<ContentHash>,
    pub executor_id: String,
    pub session_id: SessionId,
    pub prev_hash: Option<ContentHash>,
    pub lamport_clock: LamportClock,
    pub signature: Option<String>,
    pub signer_key_id: Option<SignerKeyId>,
    pub timestamp: Timestamp,
    pub tape_refs: Vec<u64>,
    /// Populated only on `Failure`/`Compensated` with a taxonomy reason
    /// (`TRANSIENT`, `PERMANENT`, …) — see `kernel_store::engine::ExecutionError`.
    pub failure_reason: Option<String>,
}

impl Receipt {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, ReceiptStatus::Success | ReceiptStatus::Failure | ReceiptStatus::Compensated)
    }

    /// The canonical payload that gets signed and hashed: every field except
    /// the signature itself.
    pub fn canonical_payload(&self) -> Canonical {
        let mut map = BTreeMap::new();
        map.insert("receipt_id".to_string(), Canonical::String(self.receipt_id.as_str().to_string()));
        map.insert("decision_id".to_string(), Canonical::String(self.decision_id.as_str().to_string()));
        map.insert("effect_id".to_string(), Canonical::String(self.effect_id.as_str().to_string()));
        map.insert(
            "status".to_string(),
            Canonical::String(
                match self.status {
                    ReceiptStatus::Success => "SUCCESS",
                    ReceiptStatus::Failure => "FAILURE",
                    ReceiptStatus::Compensated => "COMPENSATED",
                }
                .to_string(),
            ),
        );
        map.insert(
            "output_hash".to_string(),
            match &self.output_hash {
                Some(h) => Canonical::String(h.to_string()),
                None => Canonical::Null,
            },
        );
        map.insert("executor_id".to_string(), Canonical::String(self.executor_id.clone()));
        map.insert("session_id".to_string(), Canonical::String(self.session_id.as_str().to_string()));
        map.insert(
            "prev_hash".to_string(),
            match &self.prev_hash {
                Some(h) => Canonical::String(h.to_string()),
                None => Canonical::Null,
            },
        );
        map.insert("lamport_clock".to_string(), Canonical::Int(self.lamport_clock as i64));
        map.insert("timestamp".to_string(), Canonical::String(self.timestamp.to_rfc3339()));
        Canonical::Map(map)
    }

    /// Content hash of this receipt's canonical payload. Used as `prev_hash`
    /// for the next Receipt in the same session.
    pub fn content_hash(&self) -> ContentHash {
        self.canonical_payload().content_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EffectId, ReceiptId};
    use chrono::Utc;

    fn sample() -> Receipt {
        Receipt {
            receipt_id: ReceiptId::new("rec-1"),
            decision_id: DecisionId::new("dec-1"),
            effect_id: EffectId::new("eff-1"),
            status: ReceiptStatus::Success,
            blob_hash: None,
            output_hash: None,
            executor_id: "executor-a".into(),
            session_id: SessionId::new("sess-1"),
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
    fn canonical_payload_excludes_signature() {
        match sample().canonical_payload() {
            Canonical::Map(m) => assert!(!m.contains_key("signature")),
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn content_hash_is_stable_for_identical_receipts() {
        assert_eq!(sample().content_hash(), sample().content_hash());
    }

    #[test]
    fn terminal_statuses_are_recognized() {
        let mut r = sample();
        assert!(r.is_terminal());
        r.status = ReceiptStatus::Failure;
        assert!(r.is_terminal());
    }
}
