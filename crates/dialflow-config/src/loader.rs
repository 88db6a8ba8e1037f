// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/dialflow/dialflow.toml`, `~/.config/dialflow/dialflow.toml`,
//! `./dialflow.toml`, then `DIALFLOW_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::DialflowConfig;

/// Sections recognised by the environment provider, in match order.
const ENV_SECTIONS: &[&str] = &[
    "service",
    "storage",
    "scheduler",
    "telephony",
    "campaign_defaults",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/dialflow/dialflow.toml`
/// 3. `~/.config/dialflow/dialflow.toml`
/// 4. `./dialflow.toml`
/// 5. `DIALFLOW_*` environment variables
pub fn load_config() -> Result<DialflowConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<DialflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DialflowConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<DialflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(DialflowConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(DialflowConfig::default()))
        .merge(Toml::file("/etc/dialflow/dialflow.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("dialflow/dialflow.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("dialflow.toml"))
        .merge(env_provider())
}

/// Map `DIALFLOW_<SECTION>_<KEY>` onto `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because both section and
/// key names contain underscores (`DIALFLOW_CAMPAIGN_DEFAULTS_MAX_CUSTOMERS`).
fn env_provider() -> Env {
    Env::prefixed("DIALFLOW_").map(|key| env_key_to_path(key.as_str()).into())
}

/// Translate a lowercased, prefix-stripped env key to a dotted config path.
pub fn env_key_to_path(key: &str) -> String {
    // Longest section names first so `campaign_defaults_` is not read as `campaign.`.
    let mut sections: Vec<&str> = ENV_SECTIONS.to_vec();
    sections.sort_by_key(|s| std::cmp::Reverse(s.len()));

    for section in sections {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
