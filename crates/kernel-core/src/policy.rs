use serde::{Deserialize, Serialize};

/// Perimeter policy enforcement mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnforcementMode {
    Enforce,
    Audit,
    Disabled,
}

/// Network perimeter: host allow/deny, TLS requirement, port allowlist, rate.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NetworkPolicy {
    #[serde(default)]
    pub allow_hosts: Vec<String>,
    #[serde(default)]
    pub deny_hosts: Vec<String>,
    #[serde(default)]
    pub require_tls: bool,
    #[serde(default)]
    pub allow_ports: Vec<u16>,
}

/// Tools perimeter: allow/deny by tool ID, attestation requirement.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolsPolicy {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
    #[serde(default)]
    pub require_attestation: bool,
}

/// Data perimeter: allowed/denied data classifications.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DataPolicy {
    #[serde(default)]
    pub allow_classes: Vec<String>,
    #[serde(default)]
    pub deny_classes: Vec<String>,
}

/// Temporal perimeter: permitted hours (0-23, UTC) and days-of-week (0-6,
/// Monday = 0).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TemporalPolicy {
    #[serde(default)]
    pub allowed_hours: Vec<u8>,
    #[serde(default)]
    pub allowed_days: Vec<u8>,
}

/// Declarative perimeter constraints evaluated by the Guardian's boundary
/// check. See `spec.md` §3 Perimeter Policy and §4.6 step 1.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PerimeterPolicy {
    pub mode: EnforcementMode,
    #[serde(default)]
    pub network: NetworkPolicy,
    #[serde(default)]
    pub tools: ToolsPolicy,
    #[serde(default)]
    pub data: DataPolicy,
    #[serde(default)]
    pub temporal: TemporalPolicy,
}

impl Default for PerimeterPolicy {
    fn default() -> Self {
        Self {
            mode: EnforcementMode::Enforce,
            network: NetworkPolicy::default(),
            tools: ToolsPolicy::default(),
            data: DataPolicy::default(),
            temporal: TemporalPolicy::default(),
        }
    }
}
