// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Dialflow call scheduler.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use dialflow_core::types::InterestLevel;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Top-level Dialflow configuration.
///
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DialflowConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Campaign runner and outcome ingestion settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Call origination provider settings.
    #[serde(default)]
    pub telephony: TelephonyConfig,

    /// Values used by `campaign create` when flags are omitted.
    #[serde(default)]
    pub campaign_defaults: CampaignDefaultsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "dialflow".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "dialflow.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// How a concluded call shifts the customer's interest level.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InterestPolicy {
    /// One level per call toward hot or cold.
    #[default]
    Stepwise,
    /// `interested` jumps straight to hot, `not_interested` to cold.
    Direct,
}

/// Campaign runner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// How often the supervisor reconciles runners with active campaigns.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Upper bound on a single runner sleep, so status changes are noticed.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// How long shutdown waits for runners to finish their current tick.
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,

    /// Offset of campaign wall-clock windows from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,

    #[serde(default)]
    pub interest_policy: InterestPolicy,

    /// Delay applied to `callback_requested` outcomes reported without a time.
    #[serde(default = "default_callback_delay_hours")]
    pub default_callback_delay_hours: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_wait_secs: default_max_wait_secs(),
            drain_timeout_secs: default_drain_timeout_secs(),
            utc_offset_minutes: 0,
            interest_policy: InterestPolicy::default(),
            default_callback_delay_hours: default_callback_delay_hours(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_max_wait_secs() -> u64 {
    300
}

fn default_drain_timeout_secs() -> u64 {
    30
}

fn default_callback_delay_hours() -> u32 {
    24
}

/// Which telephony adapter the service builds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TelephonyMode {
    /// Log and return synthetic call ids; nothing is dialled.
    #[default]
    DryRun,
    /// POST origination requests to `telephony.endpoint`.
    Http,
}

/// Telephony provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelephonyConfig {
    #[serde(default)]
    pub mode: TelephonyMode,

    /// Origination endpoint URL (required in `http` mode).
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent with each origination request.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Caller id presented to customers.
    #[serde(default)]
    pub from_number: Option<String>,

    /// Per-dispatch timeout.
    #[serde(default = "default_telephony_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            mode: TelephonyMode::default(),
            endpoint: None,
            api_token: None,
            from_number: None,
            timeout_secs: default_telephony_timeout_secs(),
        }
    }
}

fn default_telephony_timeout_secs() -> u64 {
    15
}

/// Defaults for new campaigns.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CampaignDefaultsConfig {
    #[serde(default = "default_calls_per_hour")]
    pub calls_per_hour: u32,

    /// Window opening, `HH:MM` wall-clock.
    #[serde(default = "default_start_time")]
    pub start_time: String,

    /// Window closing, `HH:MM` wall-clock (exclusive).
    #[serde(default = "default_end_time")]
    pub end_time: String,

    #[serde(default = "default_interest_levels")]
    pub interest_levels: Vec<InterestLevel>,

    #[serde(default = "default_max_days_since_last_call")]
    pub max_days_since_last_call: u32,

    #[serde(default = "default_max_customers")]
    pub max_customers: u32,
}

impl Default for CampaignDefaultsConfig {
    fn default() -> Self {
        Self {
            calls_per_hour: default_calls_per_hour(),
            start_time: default_start_time(),
            end_time: default_end_time(),
            interest_levels: default_interest_levels(),
            max_days_since_last_call: default_max_days_since_last_call(),
            max_customers: default_max_customers(),
        }
    }
}

fn default_calls_per_hour() -> u32 {
    10
}

fn default_start_time() -> String {
    "09:00".to_string()
}

fn default_end_time() -> String {
    "17:00".to_string()
}

fn default_interest_levels() -> Vec<InterestLevel> {
    vec![InterestLevel::Warm, InterestLevel::Hot]
}

fn default_max_days_since_last_call() -> u32 {
    7
}

fn default_max_customers() -> u32 {
    50
}
