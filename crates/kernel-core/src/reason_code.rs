use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed reason-code enumeration (§6 "Bit-exact surfaces"). Both the
/// code string and its canonical byte form are part of the wire contract —
/// `Display` emits exactly the strings listed in `spec.md` §6.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    Allow,
    DenyToolNotFound,
    DenySchemaMismatch,
    DenyOutputDrift,
    DenyBudgetExceeded,
    DenyDailyLimitExceeded,
    DenyMonthlyLimitExceeded,
    DenyApprovalRequired,
    DenySandboxTrap,
    DenyTimeLimit,
    DenyMemoryLimit,
    DenyPolicyViolation,
    DenyIdempotencyDuplicate,
    DenyBoundaryViolation,
    ErrorInternal,
    ReplayTapeMiss,
    ChainBroken,
    ValidationFailed,
    RuntimeError,
    RateLimit,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Allow => "ALLOW",
            ReasonCode::DenyToolNotFound => "DENY_TOOL_NOT_FOUND",
            ReasonCode::DenySchemaMismatch => "DENY_SCHEMA_MISMATCH",
            ReasonCode::DenyOutputDrift => "DENY_OUTPUT_DRIFT",
            ReasonCode::DenyBudgetExceeded => "DENY_BUDGET_EXCEEDED",
            ReasonCode::DenyDailyLimitExceeded => "DAILY_LIMIT_EXCEEDED",
            ReasonCode::DenyMonthlyLimitExceeded => "MONTHLY_LIMIT_EXCEEDED",
            ReasonCode::DenyApprovalRequired => "DENY_APPROVAL_REQUIRED",
            ReasonCode::DenySandboxTrap => "DENY_SANDBOX_TRAP",
            ReasonCode::DenyTimeLimit => "DENY_TIME_LIMIT",
            ReasonCode::DenyMemoryLimit => "DENY_MEMORY_LIMIT",
            ReasonCode::DenyPolicyViolation => "DENY_POLICY_VIOLATION",
            ReasonCode::DenyIdempotencyDuplicate => "DENY_IDEMPOTENCY_DUPLICATE",
            ReasonCode::DenyBoundaryViolation => "DENY_BOUNDARY_VIOLATION",
            ReasonCode::ErrorInternal => "ERROR_INTERNAL",
            ReasonCode::ReplayTapeMiss => "REPLAY_TAPE_MISS",
            ReasonCode::ChainBroken => "CHAIN_BROKEN",
            ReasonCode::ValidationFailed => "VALIDATION_FAILED",
            ReasonCode::RuntimeError => "RUNTIME_ERROR",
            ReasonCode::RateLimit => "RATE_LIMIT",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_renders_exactly_allow() {
        assert_eq!(ReasonCode::Allow.to_string(), "ALLOW");
    }
}
