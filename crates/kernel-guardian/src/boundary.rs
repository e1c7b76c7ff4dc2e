//! Boundary check — Guardian step 1 (§4.6). Evaluates the active
//! `PerimeterPolicy` against a request's network/tool/data/temporal
//! surface. `enforce` mode denies on the first violation found; `audit`
//! mode records it but still permits; `disabled` skips the check entirely.

use chrono::{Datelike, Timelike};
use kernel_core::types::Timestamp;
use kernel_core::{EnforcementMode, PerimeterPolicy};

/// The surface a proposed action exposes to the perimeter. Any field left
/// `None` is simply not checked against that perimeter dimension.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub network_url: Option<String>,
    pub tool_id: Option<String>,
    pub tool_attested: bool,
    pub data_class: Option<String>,
    pub requested_at: Option<Timestamp>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryViolation {
    Network,
    Tool,
    Attestation,
    Data,
    Temporal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryOutcome {
    Pass,
    /// A violation occurred but the policy is in `audit` mode.
    Audited(BoundaryViolation),
    Denied(BoundaryViolation),
}

pub fn check_boundary(policy: &PerimeterPolicy, ctx: &RequestContext) -> BoundaryOutcome {
    if matches!(policy.mode, EnforcementMode::Disabled) {
        return BoundaryOutcome::Pass;
    }
    match first_violation(policy, ctx) {
        None => BoundaryOutcome::Pass,
        Some(v) => match policy.mode {
            EnforcementMode::Enforce => BoundaryOutcome::Denied(v),
            EnforcementMode::Audit => BoundaryOutcome::Audited(v),
            EnforcementMode::Disabled => unreachable!("handled above"),
        },
    }
}

fn first_violation(policy: &PerimeterPolicy, ctx: &RequestContext) -> Option<BoundaryViolation> {
    if let Some(url) = &ctx.network_url {
        let host = host_of(url);
        if policy.network.deny_hosts.iter().any(|h| h == &host) {
            return Some(BoundaryViolation::Network);
        }
        if !policy.network.allow_hosts.is_empty() && !policy.network.allow_hosts.iter().any(|h| h == &host) {
            return Some(BoundaryViolation::Network);
        }
        if policy.network.require_tls && !url.starts_with("https://") {
            return Some(BoundaryViolation::Network);
        }
    }

    if let Some(tool_id) = &ctx.tool_id {
        if policy.tools.deny.iter().any(|t| t == tool_id) {
            return Some(BoundaryViolation::Tool);
        }
        if !policy.tools.allow.is_empty() && !policy.tools.allow.iter().any(|t| t == tool_id) {
            return Some(BoundaryViolation::Tool);
        }
        if policy.tools.require_attestation && !ctx.tool_attested {
            return Some(BoundaryViolation::Attestation);
        }
    }

    if let Some(class) = &ctx.data_class {
        if policy.data.deny_classes.iter().any(|c| c == class) {
            return Some(BoundaryViolation::Data);
        }
        if !policy.data.allow_classes.is_empty() && !policy.data.allow_classes.iter().any(|c| c == class) {
            return Some(BoundaryViolation::Data);
        }
    }

    if let Some(at) = ctx.requested_at {
        if !policy.temporal.allowed_hours.is_empty() && !policy.temporal.allowed_hours.contains(&(at.hour() as u8)) {
            return Some(BoundaryViolation::Temporal);
        }
        if !policy.temporal.allowed_days.is_empty() {
            let day = at.weekday().num_days_from_monday() as u8;
            if !policy.temporal.allowed_days.contains(&day) {
                return Some(BoundaryViolation::Temporal);
            }
        }
    }

    None
}

fn host_of(url: &str) -> String {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_core::{DataPolicy, NetworkPolicy, TemporalPolicy, ToolsPolicy};

    fn policy(mode: EnforcementMode) -> PerimeterPolicy {
        PerimeterPolicy {
            mode,
            network: NetworkPolicy { allow_hosts: vec!["api.example.com".into()], ..Default::default() },
            tools: ToolsPolicy::default(),
            data: DataPolicy::default(),
            temporal: TemporalPolicy::default(),
        }
    }

    #[test]
    fn disabled_mode_never_checks() {
        let p = policy(EnforcementMode::Disabled);
        let ctx = RequestContext { network_url: Some("http://evil.com".into()), ..Default::default() };
        assert_eq!(check_boundary(&p, &ctx), BoundaryOutcome::Pass);
    }

    #[test]
    fn enforce_mode_denies_disallowed_host() {
        let p = policy(EnforcementMode::Enforce);
        let ctx = RequestContext { network_url: Some("https://evil.com".into()), ..Default::default() };
        assert_eq!(check_boundary(&p, &ctx), BoundaryOutcome::Denied(BoundaryViolation::Network));
    }

    #[test]
    fn audit_mode_permits_but_reports_violation() {
        let p = policy(EnforcementMode::Audit);
        let ctx = RequestContext { network_url: Some("https://evil.com".into()), ..Default::default() };
        assert_eq!(check_boundary(&p, &ctx), BoundaryOutcome::Audited(BoundaryViolation::Network));
    }

    #[test]
    fn allowed_host_passes() {
        let p = policy(EnforcementMode::Enforce);
        let ctx = RequestContext { network_url: Some("https://api.example.com/v1".into()), ..Default::default() };
        assert_eq!(check_boundary(&p, &ctx), BoundaryOutcome::Pass);
    }

    #[test]
    fn missing_attestation_is_denied_when_required() {
        let mut p = policy(EnforcementMode::Enforce);
        p.tools.require_attestation = true;
        let ctx = RequestContext { tool_id: Some("shell".into()), tool_attested: false, ..Default::default() };
        assert_eq!(check_boundary(&p, &ctx), BoundaryOutcome::Denied(BoundaryViolation::Attestation));
    }
}
