use thiserror::Error;

/// All tape errors (§7 "Fail-closed principle": any replay error surfaces
/// as `REPLAY_TAPE_MISS`, never a live fallback).
#[derive(Debug, Error)]
pub enum TapeError {
    #[error("tape entry missing mandatory metadata field: {0}")]
    MissingMetadata(&'static str),
    #[error("no tape entry satisfies this query (REPLAY_TAPE_MISS)")]
    ReplayTapeMiss,
    #[error("tape manifest integrity check failed: {0}")]
    ManifestMismatch(String),
    #[error(transparent)]
    Storage(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
