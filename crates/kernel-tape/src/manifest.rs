//! Tape Manifest (§4.3) — a content commitment over every entry of a run,
//! written as `tape_manifest.json` and later re-checked by
//! `verify_integrity` (used by the Offline Verifier, §4.11, as its "Tape"
//! check).

use std::collections::{HashMap, HashSet};
use std::path::Path;

use kernel_core::{TapeEntry, TapeManifest, TapeManifestEntry};

use crate::error::TapeError;

pub fn build_manifest(run_id: impl Into<String>, entries: &[TapeEntry]) -> TapeManifest {
    let manifest_entries = entries
        .iter()
        .map(|entry| TapeManifestEntry {
            seq: entry.seq,
            entry_type: entry.entry_type,
            key: entry.key.clone(),
            sha256: entry.value_hash.to_hex(),
            size_bytes: entry.value.as_ref().map(|v| v.len() as u64).unwrap_or(0),
        })
        .collect();
    TapeManifest { run_id: run_id.into(), entries: manifest_entries }
}

/// Emit `tape_manifest.json` into `dir` in canonical (pretty, stable-key)
/// JSON form.
pub fn write(dir: &Path, manifest: &TapeManifest) -> Result<(), TapeError> {
    let path = dir.join("tape_manifest.json");
    let bytes = serde_json::to_vec_pretty(manifest)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Recompute each entry's hash and size against `manifest`, reporting every
/// mismatch and orphaned reference in one pass rather than failing on the
/// first.
pub fn verify_integrity(entries: &[TapeEntry], manifest: &TapeManifest) -> Result<(), TapeError> {
    let mut problems = Vec::new();
    let by_seq: HashMap<u64, &TapeManifestEntry> = manifest.entries.iter().map(|m| (m.seq, m)).collect();

    for entry in entries {
        match by_seq.get(&entry.seq) {
            Some(committed) => {
                if committed.sha256 != entry.value_hash.to_hex() {
                    problems.push(format!("seq {}: hash mismatch", entry.seq));
                }
                let actual_size = entry.value.as_ref().map(|v| v.len() as u64).unwrap_or(0);
                if committed.size_bytes != actual_size {
                    problems.push(format!("seq {}: size mismatch", entry.seq));
                }
            }
            None => problems.push(format!("seq {}: no manifest commitment", entry.seq)),
        }
    }

    let recorded_seqs: HashSet<u64> = entries.iter().map(|e| e.seq).collect();
    for committed in &manifest.entries {
        if !recorded_seqs.contains(&committed.seq) {
            problems.push(format!("seq {}: orphaned manifest reference", committed.seq));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(TapeError::ManifestMismatch(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kernel_core::TapeEntryType;
    use kernel_crypto::hash::sha256_hash;

    fn entry(seq: u64, value: &[u8]) -> TapeEntry {
        TapeEntry {
            seq,
            entry_type: TapeEntryType::ToolOutput,
            component_id: "shell".into(),
            key: "cat".into(),
            value_hash: sha256_hash(value),
            value: Some(value.to_vec()),
            timestamp: Utc::now(),
            data_class: "public".into(),
            residency_region: "us".into(),
            encryption: "none".into(),
            retention_basis: "operational".into(),
        }
    }

    #[test]
    fn manifest_commits_hash_and_size_per_entry() {
        let entries = vec![entry(1, b"abc")];
        let manifest = build_manifest("run-1", &entries);
        assert_eq!(manifest.entries[0].sha256, sha256_hash(b"abc").to_hex());
        assert_eq!(manifest.entries[0].size_bytes, 3);
    }

    #[test]
    fn verify_integrity_passes_for_unmodified_entries() {
        let entries = vec![entry(1, b"abc")];
        let manifest = build_manifest("run-1", &entries);
        assert!(verify_integrity(&entries, &manifest).is_ok());
    }

    #[test]
    fn verify_integrity_catches_a_tampered_value() {
        let entries = vec![entry(1, b"abc")];
        let manifest = build_manifest("run-1", &entries);
        let tampered = vec![entry(1, b"xyz")];
        let err = verify_integrity(&tampered, &manifest).unwrap_err();
        assert!(matches!(err, TapeError::ManifestMismatch(_)));
    }

    #[test]
    fn verify_integrity_catches_an_orphaned_reference() {
        let entries = vec![entry(1, b"abc"), entry(2, b"def")];
        let manifest = build_manifest("run-1", &entries);
        let err = verify_integrity(&entries[..1], &manifest).unwrap_err();
        assert!(matches!(err, TapeError::ManifestMismatch(_)));
    }

    #[test]
    fn write_produces_a_readable_manifest_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let entries = vec![entry(1, b"abc")];
        let manifest = build_manifest("run-1", &entries);
        write(dir.path(), &manifest).unwrap();
        let contents = std::fs::read_to_string(dir.path().join("tape_manifest.json")).unwrap();
        assert!(contents.contains("run-1"));
    }
}
