//! The Guardian decision engine (§4.6) — a pure function of `(Principal,
//! Action, Resource, Context)` apart from budget reservation, policy
//! evaluation, and appending the resulting `DecisionRecord`. Runs, in
//! order: rate limit, boundary check, budget check, policy check. The
//! first failure wins and short-circuits the rest — every path converges
//! on `finalize`, which signs the verdict, chains it onto the POLICY
//! ledger, and records a ProofGraph node.

use std::collections::BTreeMap;
use std::sync::Arc;

use kernel_core::types::{DecisionId, EffectId, SignerKeyId, Timestamp};
use kernel_core::{Budget, Canonical, DecisionRecord, Effect, KernelError, LedgerType, PerimeterPolicy, ReasonCode, Verdict};
use kernel_proofgraph::{NodeType, ProofGraph};
use kernel_store::{OutboxEntry, Store};
use tracing::{info, warn};

use crate::boundary::{check_boundary, BoundaryOutcome, RequestContext};
use crate::policy_expr::{self, PolicyErrorCode, PolicyExpr};
use crate::rate_limit::RateLimiter;

/// Everything the Guardian needs to dispose of one proposed effect.
pub struct ProposedAction {
    pub decision_id: DecisionId,
    pub principal: String,
    pub action_name: String,
    pub resource: String,
    pub context: BTreeMap<String, Canonical>,
    pub policy_refs: Vec<String>,
    pub tenant_id: String,
    pub cost: i64,
    pub boundary: RequestContext,
    pub rate_limit_key: String,
    pub requires_approval: bool,
    pub effect_id: EffectId,
    pub operation: String,
    pub idempotency_key: String,
}

pub struct GuardianOutcome {
    pub decision: DecisionRecord,
    pub effect: Option<Effect>,
}

enum BudgetOutcome {
    Ok,
    Exceeded(ReasonCode),
    StorageError,
}

pub struct Guardian {
    store: Arc<Store>,
    proofgraph: Arc<ProofGraph>,
    rate_limiter: RateLimiter,
}

impl Guardian {
    pub fn new(store: Arc<Store>, proofgraph: Arc<ProofGraph>, rate_limiter: RateLimiter) -> Self {
        Self { store, proofgraph, rate_limiter }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &self,
        action: ProposedAction,
        perimeter: &PerimeterPolicy,
        policy_expr: Option<&PolicyExpr>,
        now: Timestamp,
        sign: impl FnOnce(&Canonical) -> (String, SignerKeyId),
    ) -> Result<GuardianOutcome, KernelError> {
        if !self.rate_limiter.check(&action.rate_limit_key, now) {
            return self.finalize(action, Verdict::Deny, ReasonCode::RateLimit, now, sign);
        }

        match check_boundary(perimeter, &action.boundary) {
            BoundaryOutcome::Denied(_) => {
                return self.finalize(action, Verdict::Deny, ReasonCode::DenyBoundaryViolation, now, sign);
            }
            BoundaryOutcome::Audited(violation) => {
                warn!(?violation, "boundary violation permitted under audit mode");
            }
            BoundaryOutcome::Pass => {}
        }

        match self.check_budget(&action.tenant_id, action.cost, now) {
            BudgetOutcome::Exceeded(code) => return self.finalize(action, Verdict::Deny, code, now, sign),
            BudgetOutcome::StorageError => {
                return self.finalize(action, Verdict::Deny, ReasonCode::ErrorInternal, now, sign);
            }
            BudgetOutcome::Ok => {}
        }

        if let Some(expr) = policy_expr {
            match policy_expr::evaluate(expr, &action.context) {
                Ok(true) => {}
                Ok(false) => {
                    return self.finalize(action, Verdict::Deny, ReasonCode::DenyPolicyViolation, now, sign);
                }
                Err(e) => {
                    let code = match e.code {
                        PolicyErrorCode::ValidationFailed => ReasonCode::ValidationFailed,
                        PolicyErrorCode::RuntimeError => ReasonCode::RuntimeError,
                    };
                    return self.finalize(action, Verdict::Deny, code, now, sign);
                }
            }
        }

        if action.requires_approval {
            return self.finalize(action, Verdict::Defer, ReasonCode::DenyApprovalRequired, now, sign);
        }

        self.finalize(action, Verdict::Pass, ReasonCode::Allow, now, sign)
    }

    /// Fail-closed budget check (§4.6 step 2, §7 "Fail-closed principle").
    /// A pre-check against the last-known `Budget` picks the specific
    /// DAILY/MONTHLY reason code; the real atomic reservation then confirms
    /// or rejects it, so the pre-check is advisory only, never the source
    /// of truth.
    fn check_budget(&self, tenant_id: &str, cost: i64, now: Timestamp) -> BudgetOutcome {
        let existing = match self.store.get_budget(tenant_id) {
            Ok(b) => b,
            Err(_) => return BudgetOutcome::StorageError,
        };
        let mut projected = existing.unwrap_or_else(|| Budget::new(tenant_id, now));
        projected.roll_over(now);
        if projected.daily_used + cost > projected.daily_limit {
            return BudgetOutcome::Exceeded(ReasonCode::DenyDailyLimitExceeded);
        }
        if projected.monthly_used + cost > projected.monthly_limit {
            return BudgetOutcome::Exceeded(ReasonCode::DenyMonthlyLimitExceeded);
        }
        match self.store.reserve_budget(tenant_id, cost, now) {
            Ok(_) => BudgetOutcome::Ok,
            Err(_) => BudgetOutcome::StorageError,
        }
    }

    fn finalize(
        &self,
        action: ProposedAction,
        verdict: Verdict,
        reason_code: ReasonCode,
        now: Timestamp,
        sign: impl FnOnce(&Canonical) -> (String, SignerKeyId),
    ) -> Result<GuardianOutcome, KernelError> {
        let mut decision = DecisionRecord {
            decision_id: action.decision_id,
            principal: action.principal,
            action: action.action_name,
            resource: action.resource,
            context: action.context.clone(),
            verdict,
            reason_code,
            policy_refs: action.policy_refs,
            timestamp: now,
            signature: None,
            signer_key_id: None,
        };
        let (signature, signer_key_id) = sign(&decision.canonical_payload());
        decision.signature = Some(signature);
        decision.signer_key_id = Some(signer_key_id);

        let payload_hash = decision.canonical_payload().content_hash();
        self.store.append_ledger(LedgerType::Policy, "guardian", payload_hash.clone(), now)?;
        self.proofgraph.append(NodeType::Decision, payload_hash)?;

        info!(
            decision_id = %decision.decision_id,
            verdict = ?decision.verdict,
            reason = %decision.reason_code,
            "decision disposed"
        );

        let effect = if decision.is_pass() {
            let effect = Effect {
                effect_id: action.effect_id,
                decision_id: decision.decision_id.clone(),
                operation: action.operation,
                payload: action.context,
                idempotency_key: action.idempotency_key,
                scheduled_at: now,
            };
            let effect_hash = effect.canonical_payload().content_hash();
            self.store
                .schedule(OutboxEntry::new(decision.decision_id.clone(), effect_hash.clone(), now))?;
            self.proofgraph.append(NodeType::Effect, effect_hash)?;
            Some(effect)
        } else {
            None
        };

        Ok(GuardianOutcome { decision, effect })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(v: serde_json::Value) -> BTreeMap<String, Canonical> {
        match Canonical::normalize(&v).unwrap() {
            Canonical::Map(m) => m,
            _ => panic!("expected map"),
        }
    }

    fn guardian() -> Guardian {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(Store::open(dir.path()).expect("open store"));
        let proofgraph = Arc::new(ProofGraph::new());
        Guardian::new(store, proofgraph, RateLimiter::new(1_000))
    }

    fn base_action() -> ProposedAction {
        ProposedAction {
            decision_id: DecisionId::new("dec-1"),
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
            effect_id: EffectId::new("eff-1"),
            operation: "shell.exec".into(),
            idempotency_key: "idem-1".into(),
        }
    }

    fn sign(_payload: &Canonical) -> (String, SignerKeyId) {
        ("sig".to_string(), SignerKeyId::new("key-1"))
    }

    #[test]
    fn clean_request_passes_and_produces_an_effect() {
        let g = guardian();
        let outcome = g
            .evaluate(base_action(), &PerimeterPolicy::default(), None, chrono::Utc::now(), sign)
            .unwrap();
        assert!(outcome.decision.is_pass());
        assert!(outcome.effect.is_some());
    }

    #[test]
    fn boundary_violation_denies_with_no_effect() {
        let g = guardian();
        let mut action = base_action();
        action.boundary.network_url = Some("https://evil.example".into());
        let mut perimeter = PerimeterPolicy::default();
        perimeter.network.allow_hosts = vec!["api.example.com".into()];
        let outcome = g.evaluate(action, &perimeter, None, chrono::Utc::now(), sign).unwrap();
        assert_eq!(outcome.decision.verdict, Verdict::Deny);
        assert_eq!(outcome.decision.reason_code, ReasonCode::DenyBoundaryViolation);
        assert!(outcome.effect.is_none());
    }

    #[test]
    fn over_budget_denies_with_daily_limit_exceeded() {
        let g = guardian();
        let now = chrono::Utc::now();
        let mut budget = Budget::new("tenant-a", now);
        budget.daily_limit = 0;
        g.store.put_budget(&budget).unwrap();

        let outcome = g.evaluate(base_action(), &PerimeterPolicy::default(), None, now, sign).unwrap();
        assert_eq!(outcome.decision.verdict, Verdict::Deny);
        assert_eq!(outcome.decision.reason_code, ReasonCode::DenyDailyLimitExceeded);
    }

    #[test]
    fn policy_expression_false_denies_with_policy_violation() {
        let g = guardian();
        let expr = PolicyExpr::Eq(
            Box::new(PolicyExpr::Field(vec!["resource".into()])),
            Box::new(PolicyExpr::Literal(policy_expr::Literal::Str("network.http".into()))),
        );
        let outcome = g
            .evaluate(base_action(), &PerimeterPolicy::default(), Some(&expr), chrono::Utc::now(), sign)
            .unwrap();
        assert_eq!(outcome.decision.verdict, Verdict::Deny);
        assert_eq!(outcome.decision.reason_code, ReasonCode::DenyPolicyViolation);
    }

    #[test]
    fn requires_approval_defers() {
        let g = guardian();
        let mut action = base_action();
        action.requires_approval = true;
        let outcome = g.evaluate(action, &PerimeterPolicy::default(), None, chrono::Utc::now(), sign).unwrap();
        assert_eq!(outcome.decision.verdict, Verdict::Defer);
        assert!(outcome.effect.is_none());
    }

    #[test]
    fn rate_limited_request_is_denied() {
        let dir = tempfile::tempdir().expect("tempdir");
        let g = Guardian::new(
            Arc::new(Store::open(dir.path()).unwrap()),
            Arc::new(ProofGraph::new()),
            RateLimiter::new(1),
        );
        let now = chrono::Utc::now();
        let mut a1 = base_action();
        a1.decision_id = DecisionId::new("dec-1");
        g.evaluate(a1, &PerimeterPolicy::default(), None, now, sign).unwrap();

        let mut a2 = base_action();
        a2.decision_id = DecisionId::new("dec-2");
        let outcome = g.evaluate(a2, &PerimeterPolicy::default(), None, now, sign).unwrap();
        assert_eq!(outcome.decision.reason_code, ReasonCode::RateLimit);
    }
}
