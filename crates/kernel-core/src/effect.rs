use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::Canonical;
use crate::types::{DecisionId, EffectId, Timestamp};

/// The side effect commanded by a PASS decision. Exactly one `Effect` per
/// PASS `DecisionRecord`; none for DENY/DEFER. See `spec.md` §3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Effect {
    pub effect_id: EffectId,
    pub decision_id: DecisionId,
    pub operation: String,
    pub payload: BTreeMap<String, Canonical>,
    pub idempotency_key: String,
    pub scheduled_at: Timestamp,
}

impl Effect {
    pub fn canonical_payload(&self) -> Canonical {
        Canonical::Map(self.payload.clone())
    }
}
