use serde::{Deserialize, Serialize};

use crate::types::{ContentHash, Sequence, Timestamp};

/// The four concrete hash-chained ledger instances. Cross-ledger references
/// are by `content_hash` only — ledgers are independent append-only logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerType {
    Release,
    Policy,
    Run,
    Evidence,
}

impl LedgerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerType::Release => "RELEASE",
            LedgerType::Policy => "POLICY",
            LedgerType::Run => "RUN",
            LedgerType::Evidence => "EVIDENCE",
        }
    }
}

/// One entry in a generic hash-chained ledger. `content_hash = H(sequence,
/// type, payload_hash, prev_hash)`; genesis `prev_hash` is the literal
/// string `"genesis"`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub sequence: Sequence,
    pub entry_type: LedgerType,
    pub payload_hash: ContentHash,
    pub prev_hash: String,
    pub content_hash: ContentHash,
    pub timestamp: Timestamp,
    pub author: String,
}
