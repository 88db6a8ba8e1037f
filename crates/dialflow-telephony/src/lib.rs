// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telephony adapters for the Dialflow call scheduler.
//!
//! [`HttpTelephony`] posts origination requests to a provider endpoint;
//! [`DryRunTelephony`] only logs. [`build_telephony`] picks one from config.

pub mod dry_run;
pub mod http;

use std::sync::Arc;

use dialflow_config::TelephonyMode;
use dialflow_config::model::TelephonyConfig;
use dialflow_core::{DialflowError, TelephonyAdapter};

pub use dry_run::DryRunTelephony;
pub use http::HttpTelephony;

/// Build the adapter selected by `telephony.mode`.
pub fn build_telephony(config: &TelephonyConfig) -> Result<Arc<dyn TelephonyAdapter>, DialflowError> {
    match config.mode {
        TelephonyMode::DryRun => Ok(Arc::new(DryRunTelephony::new())),
        TelephonyMode::Http => Ok(Arc::new(HttpTelephony::from_config(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialflow_core::PluginAdapter;

    #[test]
    fn default_config_builds_dry_run() {
        let adapter = build_telephony(&TelephonyConfig::default()).unwrap();
        assert_eq!(adapter.name(), "dry-run");
    }

    #[test]
    fn http_mode_without_endpoint_is_a_config_error() {
        let config = TelephonyConfig {
            mode: TelephonyMode::Http,
            ..TelephonyConfig::default()
        };
        let err = build_telephony(&config).err().expect("missing endpoint");
        assert!(matches!(err, DialflowError::Config(_)));
    }
}
