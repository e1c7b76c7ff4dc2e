//! Evidence Bundling & Offline Verification (§4.10, §4.11) — `bundle::export`
//! harvests a run's ledgers, receipts, ProofGraph, decisions, and tape into
//! one deterministic `tar.gz`; `verifier::verify_bundle` checks that bundle
//! later with no access to the store, graph, or tape that produced it, and
//! no network I/O.

pub mod bundle;
pub mod error;
pub mod verifier;

pub use bundle::{export, BundleManifest};
pub use error::EvidenceError;
pub use verifier::{verify_bundle, Check, Report};
