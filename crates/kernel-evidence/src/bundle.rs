//! Evidence Bundler (§4.10) — harvests everything a run produced into one
//! deterministic `tar.gz`: the four hash-chained ledger slices, receipts,
//! the ProofGraph, the disposed decisions, the tape manifest, and the trust
//! roots needed to check signatures offline. Two exports of the same
//! underlying state must produce byte-identical archives, so every
//! timestamp, uid/gid, and ownership field baked into the tar is fixed
//! rather than taken from the environment.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use kernel_core::constants::{EVIDENCE_MANIFEST_VERSION, TAR_FILE_MODE};
use kernel_core::types::{SessionId, Timestamp};
use kernel_core::{DecisionRecord, LedgerType, TapeEntry};
use kernel_crypto::hash::sha256_hash;
use kernel_crypto::TrustRootSet;
use kernel_proofgraph::ProofGraph;
use kernel_store::Store;
use kernel_tape::build_manifest;
use serde::{Deserialize, Serialize};

use crate::error::EvidenceError;

/// `manifest.json` — the bundle's table of contents and the per-file
/// commitment the Offline Verifier's Hashes check (§4.11) recomputes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BundleManifest {
    pub version: u32,
    pub exported_at: Timestamp,
    pub session_id: String,
    pub file_hashes: BTreeMap<String, String>,
}

const MANIFEST_NAME: &str = "manifest.json";

/// Export every artifact belonging to `session_id` into a deterministic
/// `tar.gz` at `out_path`. `decisions` is supplied explicitly because
/// `DecisionRecord`s are not themselves persisted by `Store` — only their
/// content hash ever enters a ledger entry or ProofGraph node. The tape
/// manifest is derived here, from `tape_entries`, rather than taken
/// pre-built, so the commitment is always computed over exactly what is
/// bundled alongside it.
pub fn export(
    session_id: &SessionId,
    store: &Store,
    graph: &ProofGraph,
    run_id: impl Into<String>,
    tape_entries: &[TapeEntry],
    decisions: &[DecisionRecord],
    trust_roots: &TrustRootSet,
    out_path: &Path,
    now: Timestamp,
) -> Result<(), EvidenceError> {
    let mut files: BTreeMap<String, Vec<u8>> = BTreeMap::new();

    for ledger_type in [LedgerType::Release, LedgerType::Policy, LedgerType::Run, LedgerType::Evidence] {
        let entries = store.iter_ledger(ledger_type)?;
        files.insert(format!("ledger_{}.json", ledger_type.as_str().to_lowercase()), serde_json::to_vec_pretty(&entries)?);
    }

    files.insert("receipts.json".to_string(), serde_json::to_vec_pretty(&store.iter_receipts()?)?);
    files.insert("proofgraph_nodes.json".to_string(), serde_json::to_vec_pretty(&graph.nodes())?);
    files.insert("decisions.json".to_string(), serde_json::to_vec_pretty(decisions)?);
    files.insert("tape_entries.json".to_string(), serde_json::to_vec_pretty(tape_entries)?);
    files.insert("tape_manifest.json".to_string(), serde_json::to_vec_pretty(&build_manifest(run_id, tape_entries))?);
    files.insert("trust_roots.json".to_string(), serde_json::to_vec_pretty(trust_roots)?);

    let file_hashes: BTreeMap<String, String> = files
        .iter()
        .map(|(path, bytes)| (path.clone(), sha256_hash(bytes).to_hex()))
        .collect();

    let manifest = BundleManifest {
        version: EVIDENCE_MANIFEST_VERSION,
        exported_at: now,
        session_id: session_id.as_str().to_string(),
        file_hashes,
    };
    files.insert(MANIFEST_NAME.to_string(), serde_json::to_vec_pretty(&manifest)?);

    let tar_bytes = build_tar(&files)?;
    write_gzip(out_path, &tar_bytes)?;
    Ok(())
}

/// Build a GNU-format tar with every timestamp, uid/gid, and ownership
/// field cleared, iterating `files` in `BTreeMap` (lexicographic) order.
fn build_tar(files: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>, EvidenceError> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, bytes) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(TAR_FILE_MODE);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_username("root").map_err(EvidenceError::Io)?;
        header.set_groupname("root").map_err(EvidenceError::Io)?;
        header.set_cksum();
        builder.append_data(&mut header, path, bytes.as_slice())?;
    }
    builder.into_inner().map_err(EvidenceError::Io)
}

/// Gzip `tar_bytes` at best compression with the gzip header's own mtime
/// cleared, so the compressed archive is itself byte-identical run to run.
fn write_gzip(out_path: &Path, tar_bytes: &[u8]) -> Result<(), EvidenceError> {
    let file = std::fs::File::create(out_path)?;
    let mut encoder = flate2::GzBuilder::new().mtime(0).write(file, Compression::best());
    encoder.write_all(tar_bytes)?;
    encoder.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fixture_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path()).expect("open store");
        (dir, store)
    }

    #[test]
    fn export_produces_a_readable_gzip_archive() {
        let (_dir, store) = fixture_store();
        store
            .append_ledger(LedgerType::Run, "tester", sha256_hash(b"payload"), Utc::now())
            .unwrap();
        let graph = ProofGraph::new();
        graph.append(kernel_proofgraph::NodeType::Decision, sha256_hash(b"decision")).unwrap();
        let trust_roots = TrustRootSet::default();

        let out = tempfile::NamedTempFile::new().expect("tempfile");
        export(
            &SessionId::new("sess-1"),
            &store,
            &graph,
            "run-1",
            &[],
            &[],
            &trust_roots,
            out.path(),
            Utc::now(),
        )
        .expect("export must succeed");

        let bytes = std::fs::read(out.path()).unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(&bytes[..2], &[0x1f, 0x8b], "must be a gzip stream");
    }

    #[test]
    fn export_is_deterministic_for_identical_state() {
        let (_dir, store) = fixture_store();
        store
            .append_ledger(LedgerType::Release, "tester", sha256_hash(b"payload"), Utc::now())
            .unwrap();
        let graph = ProofGraph::new();
        let trust_roots = TrustRootSet::default();
        let now: Timestamp = Utc::now();

        let out_a = tempfile::NamedTempFile::new().unwrap();
        let out_b = tempfile::NamedTempFile::new().unwrap();
        for out in [&out_a, &out_b] {
            export(&SessionId::new("sess-1"), &store, &graph, "run-1", &[], &[], &trust_roots, out.path(), now).unwrap();
        }

        let bytes_a = std::fs::read(out_a.path()).unwrap();
        let bytes_b = std::fs::read(out_b.path()).unwrap();
        assert_eq!(bytes_a, bytes_b, "identical state must export to byte-identical archives");
    }

    #[test]
    fn manifest_file_hashes_cover_every_bundled_file() {
        let (_dir, store) = fixture_store();
        let graph = ProofGraph::new();
        let trust_roots = TrustRootSet::default();

        let out = tempfile::NamedTempFile::new().unwrap();
        export(&SessionId::new("sess-1"), &store, &graph, "run-1", &[], &[], &trust_roots, out.path(), Utc::now()).unwrap();

        let decoder = flate2::read::GzDecoder::new(std::fs::File::open(out.path()).unwrap());
        let mut archive = tar::Archive::new(decoder);
        let manifest_bytes = archive
            .entries()
            .unwrap()
            .find_map(|e| {
                let mut entry = e.unwrap();
                if entry.path().unwrap().to_str() == Some(MANIFEST_NAME) {
                    let mut buf = Vec::new();
                    std::io::Read::read_to_end(&mut entry, &mut buf).unwrap();
                    Some(buf)
                } else {
                    None
                }
            })
            .expect("manifest.json must be present");
        let manifest: BundleManifest = serde_json::from_slice(&manifest_bytes).unwrap();
        assert!(manifest.file_hashes.contains_key("ledger_release.json"));
        assert!(manifest.file_hashes.contains_key("receipts.json"));
        assert!(manifest.file_hashes.contains_key("proofgraph_nodes.json"));
        assert!(manifest.file_hashes.contains_key("tape_entries.json"));
        assert!(manifest.file_hashes.contains_key("tape_manifest.json"));
        assert!(!manifest.file_hashes.contains_key(MANIFEST_NAME));
    }
}
