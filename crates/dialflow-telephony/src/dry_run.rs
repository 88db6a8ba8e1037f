// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telephony adapter that dials nothing.

use async_trait::async_trait;
use dialflow_core::{
    AdapterType, CallRequest, DialflowError, HealthStatus, PluginAdapter, TelephonyAdapter,
};
use tracing::info;

/// Logs each request and returns a synthetic `dry-run-<uuid>` call id.
#[derive(Debug, Default, Clone)]
pub struct DryRunTelephony;

impl DryRunTelephony {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PluginAdapter for DryRunTelephony {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Telephony
    }

    async fn health_check(&self) -> Result<HealthStatus, DialflowError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DialflowError> {
        Ok(())
    }
}

#[async_trait]
impl TelephonyAdapter for DryRunTelephony {
    async fn dispatch_call(&self, request: &CallRequest) -> Result<String, DialflowError> {
        let call_id = format!("dry-run-{}", uuid::Uuid::new_v4());
        info!(
            session_id = %request.session_id,
            phone = %request.phone_number,
            call_type = %request.call_type,
            call_id = %call_id,
            "dry run: call not placed"
        );
        Ok(call_id)
    }
}
