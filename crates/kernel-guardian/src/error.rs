use thiserror::Error;

/// Errors internal to the Guardian's own machinery (storage failures while
/// checking budget, malformed policy input). A policy *denial* is never
/// represented here — it is a `Verdict::Deny` on the emitted
/// `DecisionRecord`, not a `GuardianError`. See `spec.md` §7 "Fail-closed
/// principle": every one of these collapses to `DENY` at the call site, it
/// never propagates past `Guardian::evaluate`.
#[derive(Debug, Error)]
pub enum GuardianError {
    #[error("budget store error: {0}")]
    BudgetStore(#[from] kernel_core::KernelError),
}
