// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock telephony adapter for deterministic testing.
//!
//! `MockTelephony` implements `TelephonyAdapter` with pre-configured results
//! and records every request it receives.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use dialflow_core::traits::adapter::PluginAdapter;
use dialflow_core::types::{AdapterType, HealthStatus};
use dialflow_core::{CallRequest, DialflowError, TelephonyAdapter};

/// A telephony adapter that answers from a FIFO queue of scripted results.
///
/// `Ok(id)` entries are returned as provider call ids, `Err(message)` entries
/// as telephony failures. When the queue is empty every dispatch succeeds
/// with `mock-call-<n>`.
pub struct MockTelephony {
    responses: Arc<Mutex<VecDeque<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<CallRequest>>>,
    delay: Option<Duration>,
    counter: AtomicU64,
}

impl MockTelephony {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            counter: AtomicU64::new(0),
        }
    }

    pub fn with_responses(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Self::new()
        }
    }

    /// Hold every dispatch for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn add_response(&self, response: Result<String, String>) {
        self.responses.lock().await.push_back(response);
    }

    /// Script the next dispatch to fail.
    pub async fn fail_next(&self, message: &str) {
        self.add_response(Err(message.to_string())).await;
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<CallRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_response(&self) -> Result<String, String> {
        match self.responses.lock().await.pop_front() {
            Some(response) => response,
            None => {
                let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(format!("mock-call-{n}"))
            }
        }
    }
}

impl Default for MockTelephony {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTelephony {
    fn name(&self) -> &str {
        "mock-telephony"
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
impl TelephonyAdapter for MockTelephony {
    async fn dispatch_call(&self, request: &CallRequest) -> Result<String, DialflowError> {
        self.requests.lock().await.push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_response().await.map_err(DialflowError::telephony)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dialflow_core::types::{AgentId, CallSessionId, CallType, CustomerId};

    fn request() -> CallRequest {
        CallRequest {
            session_id: CallSessionId::from("s1"),
            agent_id: AgentId::from("a1"),
            customer_id: CustomerId::from("c1"),
            campaign_id: None,
            call_type: CallType::Immediate,
            phone_number: "+15550001".into(),
            customer_name: "Ann".into(),
        }
    }

    #[tokio::test]
    async fn scripted_then_default_ids() {
        let mock = MockTelephony::with_responses(vec![
            Ok("provider-1".into()),
            Err("carrier down".into()),
        ]);
        assert_eq!(mock.dispatch_call(&request()).await.unwrap(), "provider-1");
        let err = mock.dispatch_call(&request()).await.unwrap_err();
        assert!(err.to_string().contains("carrier down"));
        assert_eq!(mock.dispatch_call(&request()).await.unwrap(), "mock-call-1");
        assert_eq!(mock.call_count().await, 3);
    }

    #[tokio::test]
    async fn records_requests() {
        let mock = MockTelephony::new();
        mock.dispatch_call(&request()).await.unwrap();
        let seen = mock.requests().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].phone_number, "+15550001");
    }
}
