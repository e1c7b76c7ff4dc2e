//! Tape Replayer (§4.3) — serves a previously recorded run's nondeterministic
//! inputs back byte-for-byte. Any query it cannot serve from the tape
//! returns `REPLAY_TAPE_MISS`; it never falls back to live I/O (§7).

use std::collections::HashMap;
use std::sync::Mutex;

use kernel_core::{TapeEntry, TapeEntryType};

use crate::error::TapeError;

pub struct TapeReplayer {
    entries: Vec<TapeEntry>,
    by_key: HashMap<(TapeEntryType, String), usize>,
    cursor: Mutex<usize>,
}

impl TapeReplayer {
    /// Construct a replayer from an ordered entry list (as recorded, or as
    /// read back from a `TapeManifest`-checked source).
    pub fn new(entries: Vec<TapeEntry>) -> Self {
        let mut by_key = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            by_key.entry((entry.entry_type, entry.key.clone())).or_insert(idx);
        }
        Self { entries, by_key, cursor: Mutex::new(0) }
    }

    pub fn lookup(&self, seq: u64) -> Result<&TapeEntry, TapeError> {
        self.entries.iter().find(|e| e.seq == seq).ok_or(TapeError::ReplayTapeMiss)
    }

    pub fn lookup_by_key(&self, entry_type: TapeEntryType, key: &str) -> Result<&TapeEntry, TapeError> {
        self.by_key
            .get(&(entry_type, key.to_string()))
            .map(|&idx| &self.entries[idx])
            .ok_or(TapeError::ReplayTapeMiss)
    }

    /// Advance the replay cursor and return the next entry in `seq` order.
    pub fn next(&self) -> Result<TapeEntry, TapeError> {
        let mut cursor = self.cursor.lock().expect("replayer lock poisoned");
        let entry = self.entries.get(*cursor).cloned().ok_or(TapeError::ReplayTapeMiss)?;
        *cursor += 1;
        Ok(entry)
    }

    /// Serve a recorded network response for `url` instead of making a live
    /// request. A tape miss here is the whole point of the name: the live
    /// network path is blocked unconditionally during replay.
    pub fn block_network(&self, url: &str) -> Result<Vec<u8>, TapeError> {
        let entry = self.lookup_by_key(TapeEntryType::Network, url)?;
        entry.value.clone().ok_or(TapeError::ReplayTapeMiss)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kernel_core::ContentHash;

    fn entry(seq: u64, entry_type: TapeEntryType, key: &str, value: Option<&[u8]>) -> TapeEntry {
        TapeEntry {
            seq,
            entry_type,
            component_id: "comp".into(),
            key: key.into(),
            value_hash: ContentHash::from_bytes([0u8; 32]),
            value: value.map(|v| v.to_vec()),
            timestamp: Utc::now(),
            data_class: "public".into(),
            residency_region: "us".into(),
            encryption: "none".into(),
            retention_basis: "operational".into(),
        }
    }

    #[test]
    fn lookup_by_seq_finds_recorded_entry() {
        let replayer = TapeReplayer::new(vec![entry(1, TapeEntryType::Time, "time", Some(b"t"))]);
        assert_eq!(replayer.lookup(1).unwrap().key, "time");
    }

    #[test]
    fn lookup_of_unrecorded_seq_is_a_tape_miss() {
        let replayer = TapeReplayer::new(vec![]);
        assert!(matches!(replayer.lookup(1), Err(TapeError::ReplayTapeMiss)));
    }

    #[test]
    fn block_network_serves_recorded_response() {
        let replayer = TapeReplayer::new(vec![entry(1, TapeEntryType::Network, "https://api.example.com", Some(b"abc"))]);
        assert_eq!(replayer.block_network("https://api.example.com").unwrap(), b"abc");
    }

    #[test]
    fn block_network_never_falls_back_to_a_live_call() {
        let replayer = TapeReplayer::new(vec![]);
        assert!(matches!(replayer.block_network("https://unknown.example.com"), Err(TapeError::ReplayTapeMiss)));
    }

    #[test]
    fn next_advances_in_seq_order() {
        let replayer = TapeReplayer::new(vec![
            entry(1, TapeEntryType::Time, "a", Some(b"1")),
            entry(2, TapeEntryType::Time, "b", Some(b"2")),
        ]);
        assert_eq!(replayer.next().unwrap().seq, 1);
        assert_eq!(replayer.next().unwrap().seq, 2);
        assert!(matches!(replayer.next(), Err(TapeError::ReplayTapeMiss)));
    }
}
