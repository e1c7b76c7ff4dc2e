//! The governance kernel facade — composes canonicalization, the
//! Guardian→Executor pipeline, the ProofGraph, the VCR Tape, and Evidence
//! Bundling into one `Kernel` context an embedding application opens once
//! per run. Everything this crate needs (signing, hashing, ledgers,
//! storage) is implemented in the `kernel-*` crates it depends on; this
//! crate only wires them together and adds the configuration and driver
//! boundary an embedder needs to plug in its own tools.

pub mod config;
pub mod context;
pub mod driver;
pub mod error;

pub use config::KernelConfig;
pub use context::Kernel;
pub use driver::{DriverOutcome, EffectDriver};
pub use error::Error;

pub use kernel_core::types::{DecisionId, EffectId, ObligationId, SessionId, SignerKeyId};
pub use kernel_core::{DecisionRecord, Effect, LedgerType, PerimeterPolicy, Receipt, ReceiptStatus, Verdict};
pub use kernel_crypto::{KeyPair, TrustRootSet};
pub use kernel_guardian::{GuardianOutcome, PolicyExpr, ProposedAction, RequestContext};
pub use kernel_store::{ExecutionErrorCategory, ExecutionOutcome, LedgerQuery};
pub use kernel_tape::EntryMetadata;
