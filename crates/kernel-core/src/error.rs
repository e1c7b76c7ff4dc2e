use thiserror::Error;

/// Shared error taxonomy for the governance kernel.
///
/// Structural errors (canonicalization, hashing, chain integrity) are always
/// fatal at the point of detection and never auto-repaired. A policy denial
/// is *not* represented here — a DENY is a first-class `DecisionRecord`
/// verdict, not an error. Execution errors are classified separately by the
/// Executor's own taxonomy (`kernel_store::engine::ExecutionError`).
#[derive(Debug, Error)]
pub enum KernelError {
    // ── Canonicalizer errors (§4.1) ───────────────────────────────────────────
    #[error("fractional number on audit path: {0}")]
    FractionalNumber(String),

    #[error("non-UTF-8 object key")]
    NonUtf8Key,

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    // ── Crypto errors (§4.2) ───────────────────────────────────────────────────
    #[error("invalid signature")]
    InvalidSignature,

    #[error("unknown signer key id: {0}")]
    UnknownSignerKey(String),

    // ── Chain / hash errors (§4.4, §4.5) ───────────────────────────────────────
    #[error("hash chain broken at entry {at}")]
    ChainBroken { at: u64 },

    #[error("hash mismatch: expected {expected}, got {got}")]
    HashMismatch { expected: String, got: String },

    // ── Replay (§4.3) ───────────────────────────────────────────────────────────
    #[error("replay tape miss: {0}")]
    ReplayTapeMiss(String),

    // ── Storage / serialization ──────────────────────────────────────────────────
    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // ── Not found ────────────────────────────────────────────────────────────────
    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}
