// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that serde attributes cannot express, such
//! as parseable window times, a usable telephony endpoint, and non-zero
//! intervals.

use dialflow_core::types::{InterestLevel, TimeWindow};

use crate::diagnostic::ConfigError;
use crate::model::{DialflowConfig, TelephonyMode};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Largest UTC offset in use anywhere (UTC+14:00).
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every problem instead of stopping at the first.
pub fn validate_config(config: &DialflowConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        fail(format!(
            "service.log_level `{}` must be one of: {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let scheduler = &config.scheduler;
    if scheduler.poll_interval_secs == 0 {
        fail("scheduler.poll_interval_secs must be at least 1".to_string());
    }
    if scheduler.max_wait_secs == 0 {
        fail("scheduler.max_wait_secs must be at least 1".to_string());
    }
    if scheduler.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        fail(format!(
            "scheduler.utc_offset_minutes must be within +/-{MAX_UTC_OFFSET_MINUTES}, got {}",
            scheduler.utc_offset_minutes
        ));
    }
    if scheduler.default_callback_delay_hours == 0 {
        fail("scheduler.default_callback_delay_hours must be at least 1".to_string());
    }

    let telephony = &config.telephony;
    if telephony.timeout_secs == 0 {
        fail("telephony.timeout_secs must be at least 1".to_string());
    }
    if telephony.mode == TelephonyMode::Http {
        match telephony.endpoint.as_deref().map(str::trim) {
            None | Some("") => {
                fail("telephony.endpoint is required when telephony.mode = \"http\"".to_string())
            }
            Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => fail(
                format!("telephony.endpoint `{url}` must start with http:// or https://"),
            ),
            Some(_) => {}
        }
    }

    let defaults = &config.campaign_defaults;
    if defaults.calls_per_hour == 0 {
        fail("campaign_defaults.calls_per_hour must be greater than 0".to_string());
    }
    match TimeWindow::parse(&defaults.start_time, &defaults.end_time) {
        Ok(window) if window.is_inverted() => fail(format!(
            "campaign_defaults window {}-{} is empty or inverted",
            defaults.start_time, defaults.end_time
        )),
        Ok(_) => {}
        Err(e) => fail(format!("campaign_defaults: {e}")),
    }
    if defaults.interest_levels.is_empty() {
        fail("campaign_defaults.interest_levels must not be empty".to_string());
    }
    if defaults.interest_levels.contains(&InterestLevel::Converted) {
        fail("campaign_defaults.interest_levels must not include `converted`".to_string());
    }
    if defaults.max_customers == 0 {
        fail("campaign_defaults.max_customers must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
