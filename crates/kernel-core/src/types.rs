use serde::{Deserialize, Serialize};
use std::fmt;

/// UTC instant with nanosecond precision. Audit artifacts never embed local
/// times — every `Timestamp` in this crate is UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Per-session monotonically increasing clock. Never reused within a
/// session; see `Receipt::lamport_clock`.
pub type LamportClock = u64;

/// 1-based sequence number within a single ledger.
pub type Sequence = u64;

// ── opaque string identifiers ────────────────────────────────────────────────

macro_rules! opaque_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "({})"), self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

opaque_id!(DecisionId, "DecisionId");
opaque_id!(EffectId, "EffectId");
opaque_id!(ReceiptId, "ReceiptId");
opaque_id!(ObligationId, "ObligationId");
opaque_id!(NodeId, "NodeId");
opaque_id!(SessionId, "SessionId");
opaque_id!(SignerKeyId, "SignerKeyId");
opaque_id!(RunId, "RunId");

// ── ContentHash ───────────────────────────────────────────────────────────────

/// A SHA-256 content hash, always rendered as `sha256:<hex>`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Genesis placeholder used as `prev_hash` for the first ledger entry.
    pub const GENESIS: &'static str = "genesis";

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256:{}", self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}…)", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_display_is_prefixed() {
        let h = ContentHash::from_bytes([0u8; 32]);
        assert!(h.to_string().starts_with("sha256:"));
    }

    #[test]
    fn opaque_id_roundtrips_string() {
        let id = DecisionId::new("dec-1");
        assert_eq!(id.as_str(), "dec-1");
        assert_eq!(id.to_string(), "dec-1");
    }
}
