//! `Kernel` — the owned application context (§A.8 design note: ProofGraph
//! and Outbox are never ambient singletons, they are threaded through one
//! explicit struct). Composes the Store, ProofGraph, Guardian, Executor,
//! ObligationEngine, and Tape Recorder that the rest of the workspace
//! builds in isolation, plus the signing key material and trust roots
//! needed to seal and later check every artifact they produce.
//!
//! Dispatch follows the teacher's `main.rs` task/channel shape: `apply`
//! is a synchronous-looking `async fn` from the caller's side, but the
//! actual driver invocation and Receipt finalization happen on a single
//! background task reached over an `mpsc` channel, so two effects in the
//! same session can never race each other into `KernelEngine::finalize`.

use std::path::Path;
use std::sync::Arc;

use kernel_core::types::{DecisionId, SessionId, SignerKeyId, Timestamp};
use kernel_core::{Canonical, DecisionRecord, Effect, KernelError, LedgerType, PerimeterPolicy, ReasonCode, Receipt, Verdict};
use kernel_crypto::hash::sha256_hash;
use kernel_crypto::{KeyPair, TrustRootSet};
use kernel_guardian::{Guardian, GuardianOutcome, PolicyExpr, ProposedAction, RateLimiter};
use kernel_obligations::ObligationEngine;
use kernel_proofgraph::{NodeType, ProofGraph};
use kernel_store::{ExecutionOutcome, KernelEngine, LedgerQuery, Store};
use kernel_tape::TapeRecorder;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::config::{self, KernelConfig};
use crate::driver::{DriverOutcome, EffectDriver};
use crate::error::Error;

const DISPATCH_CHANNEL_CAPACITY: usize = 256;

struct DispatchJob {
    effect: Effect,
    session_id: SessionId,
    executor_id: String,
    now: Timestamp,
    respond: oneshot::Sender<Result<Receipt, KernelError>>,
}

pub struct Kernel {
    store: Arc<Store>,
    proofgraph: Arc<ProofGraph>,
    guardian: Guardian,
    obligations: ObligationEngine,
    tape: Arc<TapeRecorder>,
    keypair: Arc<KeyPair>,
    trust_roots: TrustRootSet,
    config: KernelConfig,
    dispatch_tx: mpsc::Sender<DispatchJob>,
}

impl Kernel {
    /// Open (or create) the kernel's storage at `config.storage.path`,
    /// wire every subsystem to it, and spawn the dispatch task. Must be
    /// called from inside a running Tokio runtime.
    pub fn open(
        config: KernelConfig,
        run_id: impl Into<String>,
        keypair: KeyPair,
        trust_roots: TrustRootSet,
        driver: Arc<dyn EffectDriver>,
    ) -> Result<Self, Error> {
        let store = Arc::new(Store::open(&config.storage.path)?);
        let proofgraph = Arc::new(ProofGraph::new());
        let rate_limiter = RateLimiter::new(config.rate_limit.max_per_window);
        let guardian = Guardian::new(store.clone(), proofgraph.clone(), rate_limiter);
        let obligations = ObligationEngine::with_max_retries(store.clone(), config.obligations.max_retries);
        let tape = Arc::new(TapeRecorder::new(run_id));
        let keypair = Arc::new(keypair);

        let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_CHANNEL_CAPACITY);
        let dispatch_engine = KernelEngine::new(store.clone(), proofgraph.clone());
        let dispatch_tape = tape.clone();
        let dispatch_keypair = keypair.clone();
        tokio::spawn(run_dispatch_loop(dispatch_rx, driver, dispatch_engine, dispatch_tape, dispatch_keypair));

        Ok(Self { store, proofgraph, guardian, obligations, tape, keypair, trust_roots, config, dispatch_tx })
    }

    /// Dispose of one proposed action. When `guardian.enforcement_mode` is
    /// `disabled`, the Guardian's checks are bypassed entirely and the
    /// action is admitted unconditionally (local development only) — the
    /// decision is still signed, ledgered, and graphed like any other.
    pub fn propose(
        &self,
        action: ProposedAction,
        perimeter: &PerimeterPolicy,
        policy_expr: Option<&PolicyExpr>,
        now: Timestamp,
    ) -> Result<GuardianOutcome, Error> {
        if self.config.guardian.enforcement_mode == config::EnforcementMode::Disabled {
            return Ok(self.admit_unconditionally(action, now)?);
        }
        let keypair = self.keypair.clone();
        Ok(self.guardian.evaluate(action, perimeter, policy_expr, now, move |payload| sign_with(&keypair, payload))?)
    }

    /// Dispatch a PASS-disposed effect through the configured driver and
    /// finalize its Receipt. Sends the work to the background dispatch
    /// task and awaits the reply, so concurrent callers never interleave
    /// with each other inside `KernelEngine::finalize`.
    pub async fn apply(
        &self,
        effect: Effect,
        session_id: SessionId,
        executor_id: impl Into<String>,
        now: Timestamp,
    ) -> Result<Receipt, Error> {
        let (respond, reply) = oneshot::channel();
        let job = DispatchJob { effect, session_id, executor_id: executor_id.into(), now, respond };
        self.dispatch_tx.send(job).await.map_err(|_| Error::DispatchClosed)?;
        let outcome = reply.await.map_err(|_| Error::DispatchClosed)?;
        Ok(outcome?)
    }

    pub fn obligations(&self) -> &ObligationEngine {
        &self.obligations
    }

    pub fn ledger_query(&self) -> LedgerQuery<'_> {
        LedgerQuery::new(&self.store)
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn proofgraph(&self) -> &Arc<ProofGraph> {
        &self.proofgraph
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Bundle everything `session_id` has produced so far into a
    /// deterministic, offline-verifiable evidence archive at `out_path`.
    pub fn export_evidence(
        &self,
        session_id: &SessionId,
        run_id: impl Into<String>,
        decisions: &[DecisionRecord],
        out_path: &Path,
        now: Timestamp,
    ) -> Result<(), Error> {
        let tape_entries = self.tape.entries();
        kernel_evidence::export(
            session_id,
            &self.store,
            &self.proofgraph,
            run_id,
            &tape_entries,
            decisions,
            &self.trust_roots,
            out_path,
            now,
        )?;
        Ok(())
    }

    fn admit_unconditionally(&self, action: ProposedAction, now: Timestamp) -> Result<GuardianOutcome, KernelError> {
        warn!(decision_id = %action.decision_id, "guardian disabled — admitting without evaluation");
        let mut decision = DecisionRecord {
            decision_id: action.decision_id,
            principal: action.principal,
            action: action.action_name,
            resource: action.resource,
            context: action.context,
            verdict: Verdict::Pass,
            reason_code: ReasonCode::Allow,
            policy_refs: action.policy_refs,
            timestamp: now,
            signature: None,
            signer_key_id: None,
        };
        let (signature, signer_key_id) = sign_with(&self.keypair, &decision.canonical_payload());
        decision.signature = Some(signature);
        decision.signer_key_id = Some(signer_key_id);

        let payload_hash = decision.canonical_payload().content_hash();
        self.store.append_ledger(LedgerType::Policy, "guardian-disabled", payload_hash.clone(), now)?;
        self.proofgraph.append(NodeType::Decision, payload_hash)?;

        let effect = Effect {
            effect_id: action.effect_id,
            decision_id: decision.decision_id.clone(),
            operation: action.operation,
            payload: action.context.clone(),
            idempotency_key: action.idempotency_key,
            scheduled_at: now,
        };
        let effect_hash = effect.canonical_payload().content_hash();
        self.store.schedule(kernel_store::OutboxEntry::new(decision.decision_id.clone(), effect_hash.clone(), now))?;
        self.proofgraph.append(NodeType::Effect, effect_hash)?;

        Ok(GuardianOutcome { decision, effect: Some(effect) })
    }
}

async fn run_dispatch_loop(
    mut rx: mpsc::Receiver<DispatchJob>,
    driver: Arc<dyn EffectDriver>,
    engine: KernelEngine,
    tape: Arc<TapeRecorder>,
    keypair: Arc<KeyPair>,
) {
    while let Some(job) = rx.recv().await {
        let DispatchJob { effect, session_id, executor_id, now, respond } = job;
        let result = dispatch_one(&effect, &session_id, &executor_id, now, driver.as_ref(), &engine, &tape, &keypair);
        let _ = respond.send(result);
    }
}

fn dispatch_one(
    effect: &Effect,
    session_id: &SessionId,
    executor_id: &str,
    now: Timestamp,
    driver: &dyn EffectDriver,
    engine: &KernelEngine,
    tape: &TapeRecorder,
    keypair: &KeyPair,
) -> Result<Receipt, KernelError> {
    let (outcome, seq) = match driver.invoke(effect) {
        DriverOutcome::Success { output, blob, metadata } => {
            let entry = tape
                .record_tool_output(executor_id, &effect.operation, &output, now, metadata)
                .map_err(|e| KernelError::ReplayTapeMiss(e.to_string()))?;
            let output_hash = sha256_hash(&output);
            let blob_hash = blob.as_deref().map(sha256_hash);
            (ExecutionOutcome::Success { output_hash, blob_hash }, entry.seq)
        }
        DriverOutcome::Failure { category, reason, metadata } => {
            let entry = tape
                .record_tool_output(executor_id, &effect.operation, reason.as_bytes(), now, metadata)
                .map_err(|e| KernelError::ReplayTapeMiss(e.to_string()))?;
            (ExecutionOutcome::Failure { category, reason }, entry.seq)
        }
    };

    engine.finalize(
        session_id.clone(),
        effect.decision_id.clone(),
        effect.effect_id.clone(),
        executor_id.to_string(),
        outcome,
        vec![seq],
        now,
        |payload| sign_with(keypair, payload),
    )
}

fn sign_with(keypair: &KeyPair, payload: &Canonical) -> (String, SignerKeyId) {
    (keypair.sign(&payload.to_jcs_bytes()), keypair.key_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kernel_guardian::RequestContext;
    use kernel_store::ExecutionErrorCategory;
    use kernel_tape::EntryMetadata;
    use rand::rngs::OsRng;
    use serde_json::json;
    use std::collections::BTreeMap;

    struct EchoDriver;

    impl EffectDriver for EchoDriver {
        fn invoke(&self, effect: &Effect) -> DriverOutcome {
            DriverOutcome::Success {
                output: effect.operation.clone().into_bytes(),
                blob: None,
                metadata: EntryMetadata {
                    data_class: "internal".into(),
                    residency_region: "us".into(),
                    encryption: "none".into(),
                    retention_basis: "operational".into(),
                },
            }
        }
    }

    struct FailingDriver;

    impl EffectDriver for FailingDriver {
        fn invoke(&self, _effect: &Effect) -> DriverOutcome {
            DriverOutcome::Failure {
                category: ExecutionErrorCategory::Transient,
                reason: "connector unreachable".into(),
                metadata: EntryMetadata {
                    data_class: "internal".into(),
                    residency_region: "us".into(),
                    encryption: "none".into(),
                    retention_basis: "operational".into(),
                },
            }
        }
    }

    fn context(v: serde_json::Value) -> BTreeMap<String, Canonical> {
        match Canonical::normalize(&v).unwrap() {
            Canonical::Map(m) => m,
            _ => panic!("expected map"),
        }
    }

    fn action(effect_id: &str, decision_id: &str) -> ProposedAction {
        ProposedAction {
            decision_id: DecisionId::new(decision_id),
            principal: "developer".into(),
            action_name: "LLM_TOOL_CALL".into(),
            resource: "shell.exec".into(),
            context: context(json!({"resource": "shell.exec"})),
            policy_refs: vec!["policy-v1".into()],
            tenant_id: "tenant-a".into(),
            cost: 1,
            boundary: RequestContext::default(),
            rate_limit_key: "tenant-a".into(),
            requires_approval: false,
            effect_id: kernel_core::types::EffectId::new(effect_id),
            operation: "shell.exec".into(),
            idempotency_key: format!("idem-{effect_id}"),
        }
    }

    fn kernel(dir: &tempfile::TempDir, driver: Arc<dyn EffectDriver>) -> Kernel {
        let mut config = KernelConfig::default();
        config.storage.path = dir.path().to_path_buf();
        let mut rng = OsRng;
        let keypair = KeyPair::generate(SignerKeyId::new("key-1"), &mut rng);
        Kernel::open(config, "run-1", keypair, TrustRootSet::default(), driver).expect("open kernel")
    }

    #[tokio::test]
    async fn propose_then_apply_yields_a_success_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = kernel(&dir, Arc::new(EchoDriver));
        let now = Utc::now();

        let outcome = kernel.propose(action("eff-1", "dec-1"), &PerimeterPolicy::default(), None, now).unwrap();
        assert!(outcome.decision.is_pass());
        let effect = outcome.effect.expect("pass yields an effect");

        let receipt = kernel.apply(effect, SessionId::new("sess-1"), "executor-1", now).await.unwrap();
        assert_eq!(receipt.status, kernel_core::ReceiptStatus::Success);
        assert_eq!(receipt.lamport_clock, 0);
    }

    #[tokio::test]
    async fn failed_driver_invocation_yields_a_failure_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = kernel(&dir, Arc::new(FailingDriver));
        let now = Utc::now();

        let outcome = kernel.propose(action("eff-1", "dec-1"), &PerimeterPolicy::default(), None, now).unwrap();
        let effect = outcome.effect.expect("pass yields an effect");

        let receipt = kernel.apply(effect, SessionId::new("sess-1"), "executor-1", now).await.unwrap();
        assert_eq!(receipt.status, kernel_core::ReceiptStatus::Failure);
    }

    #[tokio::test]
    async fn disabled_enforcement_mode_admits_without_checks() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = KernelConfig::default();
        config.storage.path = dir.path().to_path_buf();
        config.guardian.enforcement_mode = config::EnforcementMode::Disabled;
        let mut rng = OsRng;
        let keypair = KeyPair::generate(SignerKeyId::new("key-1"), &mut rng);
        let kernel = Kernel::open(config, "run-1", keypair, TrustRootSet::default(), Arc::new(EchoDriver)).unwrap();

        let mut over_budget_action = action("eff-1", "dec-1");
        over_budget_action.cost = i64::MAX;
        let outcome = kernel.propose(over_budget_action, &PerimeterPolicy::default(), None, Utc::now()).unwrap();
        assert!(outcome.decision.is_pass(), "disabled mode must bypass budget checks");
    }

    #[tokio::test]
    async fn two_effects_in_the_same_session_chain_their_lamport_clocks() {
        let dir = tempfile::tempdir().unwrap();
        let kernel = kernel(&dir, Arc::new(EchoDriver));
        let now = Utc::now();
        let session = SessionId::new("sess-1");

        let first = kernel.propose(action("eff-1", "dec-1"), &PerimeterPolicy::default(), None, now).unwrap();
        let r1 = kernel.apply(first.effect.unwrap(), session.clone(), "executor-1", now).await.unwrap();

        let second = kernel.propose(action("eff-2", "dec-2"), &PerimeterPolicy::default(), None, now).unwrap();
        let r2 = kernel.apply(second.effect.unwrap(), session, "executor-1", now).await.unwrap();

        assert_eq!(r1.lamport_clock, 0);
        assert_eq!(r2.lamport_clock, 1);
        assert_eq!(r2.prev_hash, Some(r1.content_hash()));
    }
}
