use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::canonical::Canonical;
use crate::reason_code::ReasonCode;
use crate::types::{DecisionId, SignerKeyId, Timestamp};

/// A proposed action's disposition: admitted, denied, or deferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Deny,
    Defer,
}

/// A proposed action after admission. Immutable once emitted; one-to-one
/// with a proposal. See `spec.md` §3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: DecisionId,
    pub principal: String,
    pub action: String,
    pub resource: String,
    pub context: BTreeMap<String, Canonical>,
    pub verdict: Verdict,
    pub reason_code: ReasonCode,
    pub policy_refs: Vec<String>,
    pub timestamp: Timestamp,
    /// Present once the record has been signed; `None` for an in-flight
    /// record still under construction by the Guardian.
    pub signature: Option<String>,
    pub signer_key_id: Option<SignerKeyId>,
}

impl DecisionRecord {
    /// The canonical payload that gets signed and hashed: every field except
    /// the signature itself.
    pub fn canonical_payload(&self) -> Canonical {
        let mut map = BTreeMap::new();
        map.insert(
            "decision_id".to_string(),
            Canonical::String(self.decision_id.as_str().to_string()),
        );
        map.insert("principal".to_string(), Canonical::String(self.principal.clone()));
        map.insert("action".to_string(), Canonical::String(self.action.clone()));
        map.insert("resource".to_string(), Canonical::String(self.resource.clone()));
        map.insert("context".to_string(), Canonical::Map(self.context.clone()));
        map.insert(
            "verdict".to_string(),
            Canonical::String(
                match self.verdict {
                    Verdict::Pass => "PASS",
                    Verdict::Deny => "DENY",
                    Verdict::Defer => "DEFER",
                }
                .to_string(),
            ),
        );
        map.insert(
            "reason_code".to_string(),
            Canonical::String(self.reason_code.as_str().to_string()),
        );
        map.insert(
            "policy_refs".to_string(),
            Canonical::Array(self.policy_refs.iter().cloned().map(Canonical::String).collect()),
        );
        map.insert(
            "timestamp".to_string(),
            Canonical::String(self.timestamp.to_rfc3339()),
        );
        Canonical::Map(map)
    }

    pub fn is_pass(&self) -> bool {
        matches!(self.verdict, Verdict::Pass)
    }
}
