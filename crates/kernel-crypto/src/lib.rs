pub mod hash;
pub mod signer;

pub use hash::{ledger_entry_hash, sha256_hash};
pub use signer::{verify_signature, KeyPair, SignatureError, TrustRootEntry, TrustRootSet};
