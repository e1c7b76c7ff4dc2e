use std::sync::Arc;

use kernel_core::types::{DecisionId, EffectId, ReceiptId, SessionId, Timestamp};
use kernel_core::{ContentHash, KernelError, Receipt, ReceiptStatus};
use kernel_proofgraph::{NodeType, ProofGraph};
use tracing::info;

use crate::db::Store;

// ── Execution error taxonomy (§4.8) ──────────────────────────────────────────

/// Classification of a tool outcome reported by the executor's driver.
/// `retryable()` is a pure function of the category — no special-casing
/// elsewhere decides whether an Outbox entry gets re-dispatched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionErrorCategory {
    Transient,
    Permanent,
    Permission,
    RateLimit,
    Timeout,
    Validation,
    NotFound,
    Internal,
}

impl ExecutionErrorCategory {
    pub fn retryable(&self) -> bool {
        matches!(self, ExecutionErrorCategory::Transient | ExecutionErrorCategory::RateLimit)
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            ExecutionErrorCategory::Transient => "TRANSIENT",
            ExecutionErrorCategory::Permanent => "PERMANENT",
            ExecutionErrorCategory::Permission => "PERMISSION",
            ExecutionErrorCategory::RateLimit => "RATE_LIMIT",
            ExecutionErrorCategory::Timeout => "TIMEOUT",
            ExecutionErrorCategory::Validation => "VALIDATION",
            ExecutionErrorCategory::NotFound => "NOT_FOUND",
            ExecutionErrorCategory::Internal => "INTERNAL",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ExecutionError {
    pub category: ExecutionErrorCategory,
    pub message: String,
}

impl std::fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category.reason_code(), self.message)
    }
}

impl std::error::Error for ExecutionError {}

/// The outcome of applying an Effect, before it has been turned into a
/// signed, chained Receipt.
pub enum ExecutionOutcome {
    Success {
        output_hash: ContentHash,
        blob_hash: Option<ContentHash>,
    },
    Failure {
        category: ExecutionErrorCategory,
        reason: String,
    },
}

// ── KernelEngine ──────────────────────────────────────────────────────────────

/// The Guardian→Executor atomic-commit pipeline. Given an outcome already
/// classified by the executor's driver, builds the next Receipt in a
/// session's chain and persists it atomically with marking the
/// corresponding Outbox entry DONE (§5 "Atomicity").
///
/// Session chaining (`prev_hash`, `lamport_clock`) is read and advanced
/// through the store's own per-tree transaction boundary, so concurrent
/// `finalize` calls for the same session never interleave.
pub struct KernelEngine {
    pub store: Arc<Store>,
    pub proofgraph: Arc<ProofGraph>,
}

impl KernelEngine {
    pub fn new(store: Arc<Store>, proofgraph: Arc<ProofGraph>) -> Self {
        Self { store, proofgraph }
    }

    /// Build and persist the Receipt for `decision_id`/`effect_id` in
    /// `session_id`, chaining it onto that session's last Receipt. The
    /// caller supplies a signing closure so `KernelEngine` never needs to
    /// hold key material itself.
    #[allow(clippy::too_many_arguments)]
    pub fn finalize(
        &self,
        session_id: SessionId,
        decision_id: DecisionId,
        effect_id: EffectId,
        executor_id: impl Into<String>,
        outcome: ExecutionOutcome,
        tape_refs: Vec<u64>,
        now: Timestamp,
        sign: impl FnOnce(&kernel_core::Canonical) -> (String, kernel_core::types::SignerKeyId),
    ) -> Result<Receipt, KernelError> {
        let prior = self.store.session_head(&session_id)?;
        let (prev_hash, lamport_clock) = match prior {
            Some((hash, lamport)) => (Some(hash), lamport + 1),
            None => (None, 0),
        };

        let (status, output_hash, blob_hash, failure_reason) = match outcome {
            ExecutionOutcome::Success { output_hash, blob_hash } => {
                (ReceiptStatus::Success, Some(output_hash), blob_hash, None)
            }
            ExecutionOutcome::Failure { category, reason } => {
                (ReceiptStatus::Failure, None, None, Some(format!("{}: {reason}", category.reason_code())))
            }
        };

        let mut receipt = Receipt {
            receipt_id: ReceiptId::new(format!("{decision_id}-{effect_id}")),
            decision_id: decision_id.clone(),
            effect_id,
            status,
            blob_hash,
            output_hash,
            executor_id: executor_id.into(),
            session_id,
            prev_hash,
            lamport_clock,
            signature: None,
            signer_key_id: None,
            timestamp: now,
            tape_refs,
            failure_reason,
        };

        let (signature, signer_key_id) = sign(&receipt.canonical_payload());
        receipt.signature = Some(signature);
        receipt.signer_key_id = Some(signer_key_id);

        self.store.commit_receipt_and_mark_done(&receipt, &decision_id)?;

        let payload_hash = receipt.content_hash();
        self.proofgraph.append(NodeType::Receipt, payload_hash)?;

        info!(
            receipt_id = %receipt.receipt_id,
            decision_id = %receipt.decision_id,
            status = ?receipt.status,
            "finalized receipt"
        );
        Ok(receipt)
    }
}
