// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP origination adapter.
//!
//! Each dispatch is one JSON `POST` to the configured endpoint with a bearer
//! token. Any transport error or non-2xx response is a failed dispatch; the
//! request is never retried because a provider may have originated the call
//! before failing.

use std::time::Duration;

use async_trait::async_trait;
use dialflow_config::model::TelephonyConfig;
use dialflow_core::{
    AdapterType, CallRequest, DialflowError, HealthStatus, PluginAdapter, TelephonyAdapter,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct OriginateRequest<'a> {
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
    session_id: &'a str,
    agent_id: &'a str,
    customer_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    campaign_id: Option<&'a str>,
    call_type: String,
    customer_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct OriginateResponse {
    #[serde(alias = "sid", alias = "id")]
    call_id: String,
}

/// Telephony adapter backed by a provider's HTTP origination API.
#[derive(Debug, Clone)]
pub struct HttpTelephony {
    client: reqwest::Client,
    endpoint: String,
    from_number: Option<String>,
}

impl HttpTelephony {
    pub fn new(
        endpoint: impl Into<String>,
        api_token: Option<&str>,
        from_number: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DialflowError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = api_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                DialflowError::Config(format!("invalid telephony.api_token header value: {e}"))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| DialflowError::Telephony {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            from_number,
        })
    }

    pub fn from_config(config: &TelephonyConfig) -> Result<Self, DialflowError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                DialflowError::Config("telephony.endpoint is required in http mode".into())
            })?;
        Self::new(
            endpoint,
            config.api_token.as_deref(),
            config.from_number.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl PluginAdapter for HttpTelephony {
    fn name(&self) -> &str {
        "http"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Telephony
    }

    async fn health_check(&self) -> Result<HealthStatus, DialflowError> {
        // Origination endpoints rarely expose a probe; report reachability only.
        match self.client.head(&self.endpoint).send().await {
            Ok(response) if response.status().is_server_error() => Ok(HealthStatus::Degraded(
                format!("endpoint returned {}", response.status()),
            )),
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), DialflowError> {
        Ok(())
    }
}

#[async_trait]
impl TelephonyAdapter for HttpTelephony {
    async fn dispatch_call(&self, request: &CallRequest) -> Result<String, DialflowError> {
        let body = OriginateRequest {
            to: &request.phone_number,
            from: self.from_number.as_deref(),
            session_id: request.session_id.as_str(),
            agent_id: request.agent_id.as_str(),
            customer_id: request.customer_id.as_str(),
            campaign_id: request.campaign_id.as_ref().map(|c| c.as_str()),
            call_type: request.call_type.to_string(),
            customer_name: &request.customer_name,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| DialflowError::Telephony {
                message: format!("origination request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, session_id = %request.session_id, "origination response received");

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "provider rejected origination");
            return Err(DialflowError::telephony(format!(
                "provider returned {status}: {text}"
            )));
        }

        let parsed: OriginateResponse =
            response.json().await.map_err(|e| DialflowError::Telephony {
                message: format!("failed to parse origination response: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(parsed.call_id)
    }
}
