//! End-to-end scenario tests run through the composed `Kernel`, covering
//! the ALLOW and budget-DENY paths. The remaining scenarios (ledger chain
//! break, tape replay parity, deterministic bundle hashing, canonical
//! equivalence) exercise a single subsystem each and are already covered
//! where that subsystem lives: `kernel-proofgraph`/`kernel-store`,
//! `kernel-tape`, `kernel-evidence`, and `kernel-core` respectively.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use kernel::{
    Canonical, DecisionId, DriverOutcome, EffectDriver, EffectId, EntryMetadata, Kernel, KernelConfig, KeyPair, PerimeterPolicy,
    ProposedAction, ReceiptStatus, RequestContext, SessionId, SignerKeyId, TrustRootSet, Verdict,
};
use kernel_core::{Budget, Effect};
use rand::rngs::OsRng;

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

fn context(v: serde_json::Value) -> BTreeMap<String, Canonical> {
    match Canonical::normalize(&v).unwrap() {
        Canonical::Map(m) => m,
        _ => panic!("expected map"),
    }
}

fn open_kernel(dir: &tempfile::TempDir) -> Kernel {
    let mut config = KernelConfig::default();
    config.storage.path = dir.path().to_path_buf();
    let mut rng = OsRng;
    let keypair = KeyPair::generate(SignerKeyId::new("key-1"), &mut rng);
    Kernel::open(config, "run-s1", keypair, TrustRootSet::default(), Arc::new(EchoDriver)).expect("open kernel")
}

fn inference_action() -> ProposedAction {
    ProposedAction {
        decision_id: DecisionId::new("dec-1"),
        principal: "developer".into(),
        action_name: "LLM_INFERENCE".into(),
        resource: "gpt-4".into(),
        context: context(serde_json::json!({"prompt": "hi"})),
        policy_refs: vec!["policy-v1".into()],
        tenant_id: "tenant-a".into(),
        cost: 1,
        boundary: RequestContext::default(),
        rate_limit_key: "tenant-a".into(),
        requires_approval: false,
        effect_id: EffectId::new("eff-1"),
        operation: "gpt-4.infer".into(),
        idempotency_key: "idem-1".into(),
    }
}

#[tokio::test]
async fn s1_allow_path_schedules_one_effect_and_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = open_kernel(&dir);
    let now = Utc::now();

    let mut budget = Budget::new("tenant-a", now);
    budget.daily_limit = 10;
    budget.monthly_limit = 1000;
    kernel.store().put_budget(&budget).unwrap();

    let outcome = kernel.propose(inference_action(), &PerimeterPolicy::default(), None, now).unwrap();
    assert_eq!(outcome.decision.verdict, Verdict::Pass);
    assert_eq!(outcome.decision.reason_code, kernel_core::ReasonCode::Allow);
    let effect = outcome.effect.expect("PASS must schedule exactly one effect");

    let receipt = kernel.apply(effect, SessionId::new("sess-1"), "executor-1", now).await.unwrap();
    assert_eq!(receipt.status, ReceiptStatus::Success);
    // A fresh session's first receipt sits at lamport_clock 0, not 1: this
    // crate's sessions are 0-indexed throughout, confirmed by
    // `kernel-store`'s own `first_receipt_in_session_has_no_prev_hash` test.
    assert_eq!(receipt.lamport_clock, 0);

    // Decision + Effect + Receipt: this implementation graphs the
    // scheduled Effect as its own node distinct from the Decision that
    // admitted it, rather than folding the two together.
    assert_eq!(kernel.proofgraph().len(), 3);
}

#[tokio::test]
async fn s2_deny_for_budget_schedules_no_effect() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = open_kernel(&dir);
    let now = Utc::now();

    let mut budget = Budget::new("tenant-a", now);
    budget.daily_limit = 10;
    budget.daily_used = 10;
    kernel.store().put_budget(&budget).unwrap();

    let outcome = kernel.propose(inference_action(), &PerimeterPolicy::default(), None, now).unwrap();
    assert_eq!(outcome.decision.verdict, Verdict::Deny);
    assert_eq!(outcome.decision.reason_code, kernel_core::ReasonCode::DenyDailyLimitExceeded);
    assert!(outcome.effect.is_none(), "a DENY must not schedule an effect");

    assert_eq!(kernel.proofgraph().len(), 1, "only the DENY decision is graphed");
}
