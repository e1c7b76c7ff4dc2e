//! Tape Recorder (§4.3) — captures every nondeterministic input a run makes
//! so a later Replayer can serve them byte-for-byte. `seq` is assigned under
//! the internal lock, making the recorder multi-writer safe (§5).

use std::sync::Mutex;

use kernel_core::types::Timestamp;
use kernel_core::{TapeEntry, TapeEntryType};
use kernel_crypto::hash::sha256_hash;

use crate::error::TapeError;

/// The four metadata fields §3's Tape Entry marks mandatory. A tape entry
/// missing any of them is rejected on ingestion, never silently defaulted.
#[derive(Clone, Debug)]
pub struct EntryMetadata {
    pub data_class: String,
    pub residency_region: String,
    pub encryption: String,
    pub retention_basis: String,
}

impl EntryMetadata {
    fn validate(&self) -> Result<(), TapeError> {
        if self.data_class.is_empty() {
            return Err(TapeError::MissingMetadata("data_class"));
        }
        if self.residency_region.is_empty() {
            return Err(TapeError::MissingMetadata("residency_region"));
        }
        if self.encryption.is_empty() {
            return Err(TapeError::MissingMetadata("encryption"));
        }
        if self.retention_basis.is_empty() {
            return Err(TapeError::MissingMetadata("retention_basis"));
        }
        Ok(())
    }
}

struct RecorderState {
    next_seq: u64,
    entries: Vec<TapeEntry>,
}

pub struct TapeRecorder {
    run_id: String,
    state: Mutex<RecorderState>,
}

impl TapeRecorder {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: Mutex::new(RecorderState { next_seq: 1, entries: Vec::new() }),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn record_time(&self, component_id: &str, now: Timestamp, metadata: EntryMetadata) -> Result<TapeEntry, TapeError> {
        let value = now.to_rfc3339().into_bytes();
        self.record(TapeEntryType::Time, component_id, "time", Some(value), now, metadata)
    }

    pub fn record_rng_seed(&self, component_id: &str, seed: &[u8], now: Timestamp, metadata: EntryMetadata) -> Result<TapeEntry, TapeError> {
        self.record(TapeEntryType::RngSeed, component_id, "rng_seed", Some(seed.to_vec()), now, metadata)
    }

    pub fn record_network(
        &self,
        component_id: &str,
        key: &str,
        response: &[u8],
        now: Timestamp,
        metadata: EntryMetadata,
    ) -> Result<TapeEntry, TapeError> {
        self.record(TapeEntryType::Network, component_id, key, Some(response.to_vec()), now, metadata)
    }

    pub fn record_tool_output(
        &self,
        component_id: &str,
        tool_id: &str,
        output: &[u8],
        now: Timestamp,
        metadata: EntryMetadata,
    ) -> Result<TapeEntry, TapeError> {
        self.record(TapeEntryType::ToolOutput, component_id, tool_id, Some(output.to_vec()), now, metadata)
    }

    pub fn record_db_read(
        &self,
        component_id: &str,
        key: &str,
        row: &[u8],
        now: Timestamp,
        metadata: EntryMetadata,
    ) -> Result<TapeEntry, TapeError> {
        self.record(TapeEntryType::DbRead, component_id, key, Some(row.to_vec()), now, metadata)
    }

    pub fn record_env_var(
        &self,
        component_id: &str,
        name: &str,
        value: &str,
        now: Timestamp,
        metadata: EntryMetadata,
    ) -> Result<TapeEntry, TapeError> {
        self.record(TapeEntryType::EnvVar, component_id, name, Some(value.as_bytes().to_vec()), now, metadata)
    }

    pub fn record_file_read(
        &self,
        component_id: &str,
        path: &str,
        contents: &[u8],
        now: Timestamp,
        metadata: EntryMetadata,
    ) -> Result<TapeEntry, TapeError> {
        self.record(TapeEntryType::FileRead, component_id, path, Some(contents.to_vec()), now, metadata)
    }

    fn record(
        &self,
        entry_type: TapeEntryType,
        component_id: &str,
        key: &str,
        value: Option<Vec<u8>>,
        timestamp: Timestamp,
        metadata: EntryMetadata,
    ) -> Result<TapeEntry, TapeError> {
        metadata.validate()?;
        let value_hash = sha256_hash(value.as_deref().unwrap_or(&[]));

        let mut state = self.state.lock().expect("recorder lock poisoned");
        let seq = state.next_seq;
        state.next_seq += 1;

        let entry = TapeEntry {
            seq,
            entry_type,
            component_id: component_id.to_string(),
            key: key.to_string(),
            value_hash,
            value,
            timestamp,
            data_class: metadata.data_class,
            residency_region: metadata.residency_region,
            encryption: metadata.encryption,
            retention_basis: metadata.retention_basis,
        };
        state.entries.push(entry.clone());
        Ok(entry)
    }

    /// A snapshot of every entry recorded so far, in `seq` order.
    pub fn entries(&self) -> Vec<TapeEntry> {
        self.state.lock().expect("recorder lock poisoned").entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn metadata() -> EntryMetadata {
        EntryMetadata {
            data_class: "public".into(),
            residency_region: "us".into(),
            encryption: "at-rest-aes256".into(),
            retention_basis: "operational".into(),
        }
    }

    #[test]
    fn seq_is_1_based_and_monotonic() {
        let rec = TapeRecorder::new("run-1");
        let e1 = rec.record_time("clock", Utc::now(), metadata()).unwrap();
        let e2 = rec.record_rng_seed("rng", b"seed", Utc::now(), metadata()).unwrap();
        assert_eq!(e1.seq, 1);
        assert_eq!(e2.seq, 2);
    }

    #[test]
    fn value_hash_is_eager_and_deterministic() {
        let rec = TapeRecorder::new("run-1");
        let now = Utc::now();
        let e1 = rec.record_tool_output("shell", "cat", b"abc", now, metadata()).unwrap();
        assert_eq!(e1.value_hash, sha256_hash(b"abc"));
    }

    #[test]
    fn missing_metadata_field_is_a_hard_error() {
        let rec = TapeRecorder::new("run-1");
        let mut bad = metadata();
        bad.residency_region = String::new();
        let err = rec.record_time("clock", Utc::now(), bad).unwrap_err();
        assert!(matches!(err, TapeError::MissingMetadata("residency_region")));
    }

    #[test]
    fn entries_snapshot_reflects_all_recorded_entries() {
        let rec = TapeRecorder::new("run-1");
        rec.record_time("clock", Utc::now(), metadata()).unwrap();
        rec.record_rng_seed("rng", b"seed", Utc::now(), metadata()).unwrap();
        assert_eq!(rec.entries().len(), 2);
    }
}
