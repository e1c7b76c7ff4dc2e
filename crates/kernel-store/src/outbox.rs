use kernel_core::types::{DecisionId, Timestamp};
use kernel_core::ContentHash;
use serde::{Deserialize, Serialize};

/// An Outbox entry's dispatch state. `Done` is terminal — a PENDING entry
/// may be re-dispatched after backoff, but once DONE it is never revisited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    Pending,
    Done,
}

/// A durable, at-least-once dispatch record for a PASS decision's Effect.
/// Scheduling is idempotent on `decision_id` (see `Store::schedule`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub decision_id: DecisionId,
    pub effect_payload_hash: ContentHash,
    pub scheduled_at: Timestamp,
    pub status: OutboxStatus,
    #[serde(default)]
    pub attempt: u32,
}

impl OutboxEntry {
    pub fn new(decision_id: DecisionId, effect_payload_hash: ContentHash, scheduled_at: Timestamp) -> Self {
        Self {
            decision_id,
            effect_payload_hash,
            scheduled_at,
            status: OutboxStatus::Pending,
            attempt: 0,
        }
    }
}
