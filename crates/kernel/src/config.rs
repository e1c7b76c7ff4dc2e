//! `KernelConfig` — the facade's TOML configuration, loaded the way the
//! teacher's node config loads: a `Default` baked from `kernel-core`'s
//! constants, overridden field-by-field by whatever the file supplies.

use std::path::{Path, PathBuf};

use kernel_core::constants::{
    DEFAULT_DAILY_LIMIT, DEFAULT_LEASE_DURATION_SECS, DEFAULT_MAX_RETRIES, DEFAULT_MONTHLY_LIMIT,
    DEFAULT_RATE_LIMIT_MAX_PER_WINDOW, RATE_LIMIT_WINDOW_SECS,
};
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KernelConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub guardian: GuardianConfig,
    #[serde(default)]
    pub obligations: ObligationsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_daily_limit")]
    pub default_daily_limit: i64,
    #[serde(default = "default_monthly_limit")]
    pub default_monthly_limit: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    Enforce,
    Audit,
    Disabled,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GuardianConfig {
    #[serde(default = "default_enforcement_mode")]
    pub enforcement_mode: EnforcementMode,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObligationsConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_lease_duration_secs")]
    pub lease_duration_secs: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
    #[serde(default = "default_max_per_window")]
    pub max_per_window: u32,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./kernel-data")
}
fn default_daily_limit() -> i64 {
    DEFAULT_DAILY_LIMIT
}
fn default_monthly_limit() -> i64 {
    DEFAULT_MONTHLY_LIMIT
}
fn default_enforcement_mode() -> EnforcementMode {
    EnforcementMode::Enforce
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_lease_duration_secs() -> i64 {
    DEFAULT_LEASE_DURATION_SECS
}
fn default_window_secs() -> i64 {
    RATE_LIMIT_WINDOW_SECS
}
fn default_max_per_window() -> u32 {
    DEFAULT_RATE_LIMIT_MAX_PER_WINDOW
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: default_storage_path() }
    }
}
impl Default for BudgetConfig {
    fn default() -> Self {
        Self { default_daily_limit: default_daily_limit(), default_monthly_limit: default_monthly_limit() }
    }
}
impl Default for GuardianConfig {
    fn default() -> Self {
        Self { enforcement_mode: default_enforcement_mode() }
    }
}
impl Default for ObligationsConfig {
    fn default() -> Self {
        Self { max_retries: default_max_retries(), lease_duration_secs: default_lease_duration_secs() }
    }
}
impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { window_secs: default_window_secs(), max_per_window: default_max_per_window() }
    }
}
impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            budget: BudgetConfig::default(),
            guardian: GuardianConfig::default(),
            obligations: ObligationsConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl KernelConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))
    }
}
