// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telephony adapter trait: the collaborator that actually places calls.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::DialflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{AgentId, CallSessionId, CallType, CampaignId, CustomerId};

/// Everything a provider needs to originate one outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRequest {
    pub session_id: CallSessionId,
    pub agent_id: AgentId,
    pub customer_id: CustomerId,
    pub campaign_id: Option<CampaignId>,
    pub call_type: CallType,
    pub phone_number: String,
    pub customer_name: String,
}

/// Adapter for call-origination providers.
///
/// A successful dispatch returns the provider's call identifier; the outcome
/// of the call itself arrives later through outcome ingestion.
#[async_trait]
pub trait TelephonyAdapter: PluginAdapter {
    async fn dispatch_call(&self, request: &CallRequest) -> Result<String, DialflowError>;
}
