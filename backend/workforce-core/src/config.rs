// src/config.rs

use std::env;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::SummaryError;

pub const ENV_PREFIX: &str = "WORKFORCE_";

/// Tunables for the summary engine and its resilience layer.
///
/// Every field has a default, so an empty environment yields a working config.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_weekly_hours")]
    pub default_weekly_hours: Decimal,
    #[serde(default = "default_employees_ttl_secs")]
    pub employees_ttl_secs: u64,
    #[serde(default = "default_holidays_ttl_secs")]
    pub holidays_ttl_secs: u64,
    #[serde(default = "default_metadata_ttl_secs")]
    pub reasons_ttl_secs: u64,
    /// Locations, teams, departments and tracker users/projects/clients.
    #[serde(default = "default_metadata_ttl_secs")]
    pub metadata_ttl_secs: u64,
    #[serde(default = "default_current_month_ttl_secs")]
    pub current_month_ttl_secs: u64,
    #[serde(default = "default_historical_month_ttl_secs")]
    pub historical_month_ttl_secs: u64,
    #[serde(default = "default_max_month_entries")]
    pub max_month_entries: usize,
    #[serde(default = "default_circuit_cooldown_secs")]
    pub circuit_cooldown_secs: u64,
    #[serde(default = "default_min_call_spacing_ms")]
    pub min_call_spacing_ms: u64,
    #[serde(default = "default_max_rate_limit_retries")]
    pub max_rate_limit_retries: u32,
    #[serde(default = "default_rate_limit_backoff_secs")]
    pub rate_limit_backoff_secs: u64,
    #[serde(default = "default_tracking_batch_size")]
    pub tracking_batch_size: usize,
    #[serde(default = "default_max_report_years")]
    pub max_report_years: i32,
}

fn default_weekly_hours() -> Decimal {
    dec!(40)
}
fn default_employees_ttl_secs() -> u64 {
    5 * 60
}
fn default_holidays_ttl_secs() -> u64 {
    24 * 60 * 60 // holidays rarely change
}
fn default_metadata_ttl_secs() -> u64 {
    60 * 60
}
fn default_current_month_ttl_secs() -> u64 {
    5 * 60
}
fn default_historical_month_ttl_secs() -> u64 {
    24 * 60 * 60
}
fn default_max_month_entries() -> usize {
    36
}
fn default_circuit_cooldown_secs() -> u64 {
    15 * 60
}
fn default_min_call_spacing_ms() -> u64 {
    1100 // leaky bucket allows 1 req/sec
}
fn default_max_rate_limit_retries() -> u32 {
    2
}
fn default_rate_limit_backoff_secs() -> u64 {
    3
}
fn default_tracking_batch_size() -> usize {
    3
}
fn default_max_report_years() -> i32 {
    5
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_weekly_hours: default_weekly_hours(),
            employees_ttl_secs: default_employees_ttl_secs(),
            holidays_ttl_secs: default_holidays_ttl_secs(),
            reasons_ttl_secs: default_metadata_ttl_secs(),
            metadata_ttl_secs: default_metadata_ttl_secs(),
            current_month_ttl_secs: default_current_month_ttl_secs(),
            historical_month_ttl_secs: default_historical_month_ttl_secs(),
            max_month_entries: default_max_month_entries(),
            circuit_cooldown_secs: default_circuit_cooldown_secs(),
            min_call_spacing_ms: default_min_call_spacing_ms(),
            max_rate_limit_retries: default_max_rate_limit_retries(),
            rate_limit_backoff_secs: default_rate_limit_backoff_secs(),
            tracking_batch_size: default_tracking_batch_size(),
            max_report_years: default_max_report_years(),
        }
    }
}

impl EngineConfig {
    /// Reads `WORKFORCE_*` variables, e.g. `WORKFORCE_CIRCUIT_COOLDOWN_SECS=600`.
    pub fn from_env() -> Result<Self, SummaryError> {
        envy::prefixed(ENV_PREFIX)
            .from_env::<EngineConfig>()
            .map_err(|e| SummaryError::Config(e.to_string()))
    }

    pub fn employees_ttl(&self) -> Duration {
        Duration::from_secs(self.employees_ttl_secs)
    }
    pub fn holidays_ttl(&self) -> Duration {
        Duration::from_secs(self.holidays_ttl_secs)
    }
    pub fn reasons_ttl(&self) -> Duration {
        Duration::from_secs(self.reasons_ttl_secs)
    }
    pub fn metadata_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_ttl_secs)
    }
    pub fn current_month_ttl(&self) -> Duration {
        Duration::from_secs(self.current_month_ttl_secs)
    }
    pub fn historical_month_ttl(&self) -> Duration {
        Duration::from_secs(self.historical_month_ttl_secs)
    }
    pub fn circuit_cooldown(&self) -> Duration {
        Duration::from_secs(self.circuit_cooldown_secs)
    }
    pub fn min_call_spacing(&self) -> Duration {
        Duration::from_millis(self.min_call_spacing_ms)
    }
    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_secs(self.rate_limit_backoff_secs)
    }
}

/// Credentials for the time-tracking upstream. Absent credentials disable it.
#[derive(Debug, Clone)]
pub struct TogglConfig {
    pub api_token: String,
    pub workspace_id: String,
}

impl TogglConfig {
    pub fn from_env() -> Option<Self> {
        let api_token = env::var("TOGGL_API_TOKEN").ok().filter(|v| !v.is_empty())?;
        let workspace_id = env::var("TOGGL_WORKSPACE_ID")
            .ok()
            .filter(|v| !v.is_empty())?;
        Some(Self {
            api_token,
            workspace_id,
        })
    }
}
