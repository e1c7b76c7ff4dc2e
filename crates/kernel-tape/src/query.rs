//! Read-only lookups over a recorded run's tape entries, grounded on the
//! teacher's `RecoveryQuery<'a>{db}` shape but over an in-memory entry slice
//! rather than a store — the tape itself is never persisted to `sled`, only
//! to its manifest.

use kernel_core::{TapeEntry, TapeEntryType};

pub struct TapeQuery<'a> {
    entries: &'a [TapeEntry],
}

impl<'a> TapeQuery<'a> {
    pub fn new(entries: &'a [TapeEntry]) -> Self {
        Self { entries }
    }

    pub fn get(&self, seq: u64) -> Option<&TapeEntry> {
        self.entries.iter().find(|e| e.seq == seq)
    }

    pub fn by_type(&self, entry_type: TapeEntryType) -> Vec<&TapeEntry> {
        self.entries.iter().filter(|e| e.entry_type == entry_type).collect()
    }

    pub fn describe(&self) -> String {
        match self.entries.last() {
            Some(last) => format!("{} entries, seq 1..={}", self.entries.len(), last.seq),
            None => "0 entries".to_string(),
        }
    }
}
