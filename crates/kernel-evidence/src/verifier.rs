//! Offline Verifier (§4.11) — checks a bundle produced by `bundle::export`
//! with no access to the store, graph, or tape that produced it, and no
//! network I/O. Everything it needs to check is already inside the archive.
//!
//! Checks run in a fixed order — Structure, Hashes, Signatures, Chains,
//! Tape, Replay — and every check runs to completion even after an earlier
//! one fails, so a caller sees every problem in one pass rather than
//! re-running the verifier to find the next one.
//!
//! The Signatures check covers `DecisionRecord` and `Receipt` — the two
//! artifact types the rest of this codebase actually signs
//! (`kernel-guardian`'s and `kernel-store`'s `canonical_payload()` calls).
//! ProofGraph node signatures, where present, are an input to `node_hash`
//! and so are already covered by the Chains check's `verify_self_hash`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read as _;
use std::path::Path;

use kernel_core::types::NodeId;
use kernel_core::{ContentHash, DecisionRecord, LedgerEntry, LedgerType, Receipt, TapeEntry, TapeManifest};
use kernel_crypto::hash::ledger_entry_hash;
use kernel_crypto::TrustRootSet;
use kernel_proofgraph::Node;
use serde::{Deserialize, Serialize};

use crate::bundle::BundleManifest;
use crate::error::EvidenceError;

const REQUIRED_PATHS: &[&str] = &[
    "manifest.json",
    "ledger_release.json",
    "ledger_policy.json",
    "ledger_run.json",
    "ledger_evidence.json",
    "receipts.json",
    "proofgraph_nodes.json",
    "decisions.json",
    "tape_entries.json",
    "tape_manifest.json",
    "trust_roots.json",
];

/// One named check's outcome, in the order `verify_bundle` ran it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub pass: bool,
    pub reason: Option<String>,
    pub detail: Option<String>,
}

impl Check {
    fn ok(name: &str, detail: impl Into<String>) -> Self {
        Self { name: name.to_string(), pass: true, reason: None, detail: Some(detail.into()) }
    }

    fn fail(name: &str, reason: impl Into<String>) -> Self {
        Self { name: name.to_string(), pass: false, reason: Some(reason.into()), detail: None }
    }
}

/// The Offline Verifier's full report. A Canonical Value in its own right —
/// callers can hash and sign it the same way as any other audit-path
/// artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Report {
    pub verified: bool,
    pub checks: Vec<Check>,
}

/// Verify `path` (a bundle produced by `bundle::export`) entirely offline.
/// Does no network I/O and does not require a live `Store`, `ProofGraph`,
/// or `TapeRecorder` — every check operates on the archive's own contents.
pub fn verify_bundle(path: &Path, trust_roots: &TrustRootSet) -> Result<Report, EvidenceError> {
    let files = extract(path)?;
    let mut checks = Vec::new();

    let manifest = check_structure(&files, &mut checks);
    check_hashes(&files, manifest.as_ref(), &mut checks);
    check_signatures(&files, trust_roots, &mut checks);
    check_chains(&files, &mut checks);
    check_tape(&files, &mut checks);
    checks.push(check_replay());

    let verified = checks.iter().all(|c| c.pass);
    Ok(Report { verified, checks })
}

fn extract(path: &Path) -> Result<BTreeMap<String, Vec<u8>>, EvidenceError> {
    let file = std::fs::File::open(path)?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    let mut files = BTreeMap::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        files.insert(path, buf);
    }
    Ok(files)
}

fn parse<T: for<'de> Deserialize<'de>>(files: &BTreeMap<String, Vec<u8>>, path: &str) -> Result<T, String> {
    let bytes = files.get(path).ok_or_else(|| format!("{path}: not present in bundle"))?;
    serde_json::from_slice(bytes).map_err(|e| format!("{path}: {e}"))
}

fn check_structure(files: &BTreeMap<String, Vec<u8>>, checks: &mut Vec<Check>) -> Option<BundleManifest> {
    let mut missing: Vec<&str> = REQUIRED_PATHS.iter().copied().filter(|p| !files.contains_key(*p)).collect();
    missing.sort_unstable();

    let manifest = match parse::<BundleManifest>(files, "manifest.json") {
        Ok(m) if missing.is_empty() => {
            checks.push(Check::ok("structure", format!("{} required paths present, manifest.json parses", REQUIRED_PATHS.len())));
            Some(m)
        }
        Ok(m) => {
            checks.push(Check::fail("structure", format!("missing required paths: {}", missing.join(", "))));
            Some(m)
        }
        Err(e) => {
            checks.push(Check::fail("structure", e));
            None
        }
    };
    manifest
}

fn check_hashes(files: &BTreeMap<String, Vec<u8>>, manifest: Option<&BundleManifest>, checks: &mut Vec<Check>) {
    let Some(manifest) = manifest else {
        checks.push(Check::fail("hashes", "no manifest to check against"));
        return;
    };
    let mut problems = Vec::new();
    for (path, expected_hex) in &manifest.file_hashes {
        match files.get(path) {
            Some(bytes) => {
                let actual_hex = kernel_crypto::hash::sha256_hash(bytes).to_hex();
                if &actual_hex != expected_hex {
                    problems.push(format!("{path}: hash mismatch"));
                }
            }
            None => problems.push(format!("{path}: committed in manifest but not present in bundle")),
        }
    }
    if problems.is_empty() {
        checks.push(Check::ok("hashes", format!("{} files match their manifest commitment", manifest.file_hashes.len())));
    } else {
        checks.push(Check::fail("hashes", problems.join("; ")));
    }
}

fn check_signatures(files: &BTreeMap<String, Vec<u8>>, trust_roots: &TrustRootSet, checks: &mut Vec<Check>) {
    let mut problems = Vec::new();
    let mut verified_count = 0;

    match parse::<Vec<DecisionRecord>>(files, "decisions.json") {
        Ok(decisions) => {
            for decision in &decisions {
                if let (Some(sig), Some(key_id)) = (&decision.signature, &decision.signer_key_id) {
                    let bytes = decision.canonical_payload().to_jcs_bytes();
                    match trust_roots.verify(key_id, &bytes, sig) {
                        Ok(()) => verified_count += 1,
                        Err(e) => problems.push(format!("decision {}: {e}", decision.decision_id.as_str())),
                    }
                }
            }
        }
        Err(e) => problems.push(e),
    }

    match parse::<Vec<Receipt>>(files, "receipts.json") {
        Ok(receipts) => {
            for receipt in &receipts {
                if let (Some(sig), Some(key_id)) = (&receipt.signature, &receipt.signer_key_id) {
                    let bytes = receipt.canonical_payload().to_jcs_bytes();
                    match trust_roots.verify(key_id, &bytes, sig) {
                        Ok(()) => verified_count += 1,
                        Err(e) => problems.push(format!("receipt {}: {e}", receipt.receipt_id.as_str())),
                    }
                }
            }
        }
        Err(e) => problems.push(e),
    }

    if problems.is_empty() {
        checks.push(Check::ok("signatures", format!("{verified_count} signed artifacts verified against trust roots")));
    } else {
        checks.push(Check::fail("signatures", problems.join("; ")));
    }
}

fn check_chains(files: &BTreeMap<String, Vec<u8>>, checks: &mut Vec<Check>) {
    let mut problems = Vec::new();

    for (path, ledger_type) in [
        ("ledger_release.json", LedgerType::Release),
        ("ledger_policy.json", LedgerType::Policy),
        ("ledger_run.json", LedgerType::Run),
        ("ledger_evidence.json", LedgerType::Evidence),
    ] {
        match parse::<Vec<LedgerEntry>>(files, path) {
            Ok(entries) => verify_ledger_slice(ledger_type, &entries, &mut problems),
            Err(e) => problems.push(e),
        }
    }

    match parse::<Vec<Node>>(files, "proofgraph_nodes.json") {
        Ok(nodes) => verify_proofgraph_slice(&nodes, &mut problems),
        Err(e) => problems.push(e),
    }

    if problems.is_empty() {
        checks.push(Check::ok("chains", "every ledger and proofgraph slice walks cleanly"));
    } else {
        checks.push(Check::fail("chains", problems.join("; ")));
    }
}

fn verify_ledger_slice(ledger_type: LedgerType, entries: &[LedgerEntry], problems: &mut Vec<String>) {
    let mut expected_prev = ContentHash::GENESIS.to_string();
    for entry in entries {
        if entry.prev_hash != expected_prev {
            problems.push(format!("{}: entry {} prev_hash does not chain from the prior entry", ledger_type.as_str(), entry.sequence));
        }
        let recomputed = ledger_entry_hash(entry.sequence, entry.entry_type.as_str(), &entry.payload_hash, &entry.prev_hash);
        if recomputed != entry.content_hash {
            problems.push(format!("{}: entry {} content_hash does not match its recomputed hash", ledger_type.as_str(), entry.sequence));
        }
        expected_prev = entry.content_hash.to_string();
    }
}

fn verify_proofgraph_slice(nodes: &[Node], problems: &mut Vec<String>) {
    let by_id: HashMap<&NodeId, &Node> = nodes.iter().map(|n| (&n.node_id, n)).collect();

    for node in nodes {
        for parent in &node.parent_ids {
            if !by_id.contains_key(parent) {
                problems.push(format!("node {}: parent {} not present in bundle", node.node_id, parent));
            }
        }
        if let Err(e) = node.verify_self_hash() {
            problems.push(format!("node {}: {e}", node.node_id));
        }
    }

    let mut seen = HashSet::new();
    let mut prior_lamport = None;
    for node in nodes {
        if !seen.insert(node.lamport) {
            problems.push(format!("node {}: duplicate lamport clock {}", node.node_id, node.lamport));
        } else if let Some(prior) = prior_lamport {
            if node.lamport < prior {
                problems.push(format!("node {}: lamport clock out of order", node.node_id));
            }
        }
        prior_lamport = Some(node.lamport);
    }
}

fn check_tape(files: &BTreeMap<String, Vec<u8>>, checks: &mut Vec<Check>) {
    let entries: Vec<TapeEntry> = match parse(files, "tape_entries.json") {
        Ok(e) => e,
        Err(e) => {
            checks.push(Check::fail("tape", e));
            return;
        }
    };
    let manifest: TapeManifest = match parse(files, "tape_manifest.json") {
        Ok(m) => m,
        Err(e) => {
            checks.push(Check::fail("tape", e));
            return;
        }
    };

    let mut problems = Vec::new();
    for entry in &entries {
        if entry.data_class.is_empty() || entry.residency_region.is_empty() || entry.encryption.is_empty() || entry.retention_basis.is_empty() {
            problems.push(format!("seq {}: missing mandatory metadata", entry.seq));
        }
    }
    if let Err(e) = kernel_tape::verify_integrity(&entries, &manifest) {
        problems.push(e.to_string());
    }

    if problems.is_empty() {
        checks.push(Check::ok("tape", format!("{} tape entries match their manifest commitment", entries.len())));
    } else {
        checks.push(Check::fail("tape", problems.join("; ")));
    }
}

/// Replaying the effect pipeline over the tape requires a live Guardian and
/// Executor, which a standalone bundle verifier does not have. Always
/// passes, but says so honestly rather than silently skipping the slot.
fn check_replay() -> Check {
    Check::ok("replay", "skipped: standalone bundle verification has no live effect pipeline to replay against")
}
