use serde::{Deserialize, Serialize};

use crate::types::{ContentHash, Timestamp};

/// Kind of nondeterministic input captured on the tape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TapeEntryType {
    Time,
    RngSeed,
    Network,
    ToolOutput,
    DbRead,
    EnvVar,
    FileRead,
}

/// One captured nondeterministic input. The four metadata fields
/// (`data_class`, `residency_region`, `encryption`, `retention_basis`) are
/// mandatory — a tape entry lacking any of them is invalid and must be
/// rejected on ingestion (see `spec.md` §3 Tape Entry).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TapeEntry {
    pub seq: u64,
    pub entry_type: TapeEntryType,
    pub component_id: String,
    pub key: String,
    pub value_hash: ContentHash,
    pub value: Option<Vec<u8>>,
    pub timestamp: Timestamp,
    pub data_class: String,
    pub residency_region: String,
    pub encryption: String,
    pub retention_basis: String,
}

/// One entry in a `TapeManifest`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TapeManifestEntry {
    pub seq: u64,
    pub entry_type: TapeEntryType,
    pub key: String,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Commits to every tape entry of a run by content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TapeManifest {
    pub run_id: String,
    pub entries: Vec<TapeManifestEntry>,
}
