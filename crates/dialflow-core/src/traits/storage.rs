// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the scheduler's persistence backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DialflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    Agent, AgentId, AgentStatus, CallSession, CallSessionId, CallbackId, Campaign, CampaignId,
    CampaignStatus, Customer, CustomerId, OutcomeUpdate, ScheduledCallback,
};

/// Persistence for agents, customers, campaigns, call sessions, and callbacks.
///
/// Methods returning `bool` are conditional writes: `false` means the guard
/// did not hold (wrong prior status, open session already present, session
/// already concluded) and nothing was written.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), DialflowError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), DialflowError>;

    // --- Agents ---

    async fn create_agent(&self, agent: &Agent) -> Result<(), DialflowError>;

    async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, DialflowError>;

    async fn list_agents(&self) -> Result<Vec<Agent>, DialflowError>;

    async fn set_agent_status(
        &self,
        id: &AgentId,
        status: AgentStatus,
    ) -> Result<bool, DialflowError>;

    // --- Customers ---

    /// Insert a customer unless one with the same phone number already exists
    /// for the agent. Returns the stored record either way.
    async fn upsert_customer(&self, customer: &Customer) -> Result<Customer, DialflowError>;

    async fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>, DialflowError>;

    async fn find_customer_by_phone(
        &self,
        agent_id: &AgentId,
        phone_number: &str,
    ) -> Result<Option<Customer>, DialflowError>;

    /// All customers of an agent, archived ones included.
    async fn list_customers(&self, agent_id: &AgentId) -> Result<Vec<Customer>, DialflowError>;

    async fn set_do_not_call(&self, id: &CustomerId, flag: bool) -> Result<bool, DialflowError>;

    async fn archive_customer(
        &self,
        id: &CustomerId,
        at: DateTime<Utc>,
    ) -> Result<bool, DialflowError>;

    // --- Campaigns ---

    /// Persist a new campaign together with its enrolled pool.
    async fn create_campaign(
        &self,
        campaign: &Campaign,
        pool: &[CustomerId],
    ) -> Result<(), DialflowError>;

    async fn get_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, DialflowError>;

    async fn list_campaigns(
        &self,
        status: Option<CampaignStatus>,
    ) -> Result<Vec<Campaign>, DialflowError>;

    /// Compare-and-set the campaign status from `from` to `to`.
    async fn transition_campaign(
        &self,
        id: &CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, DialflowError>;

    /// Replace rate, window, filter, and pool while the stored status still
    /// equals `campaign.status`.
    async fn update_campaign_definition(
        &self,
        campaign: &Campaign,
        pool: &[CustomerId],
    ) -> Result<bool, DialflowError>;

    /// Customers enrolled in the campaign pool.
    async fn list_campaign_pool(&self, id: &CampaignId) -> Result<Vec<Customer>, DialflowError>;

    /// Sessions of this campaign that have been dispatched but not concluded.
    async fn count_open_sessions(&self, id: &CampaignId) -> Result<u64, DialflowError>;

    async fn last_campaign_dispatch(
        &self,
        id: &CampaignId,
    ) -> Result<Option<DateTime<Utc>>, DialflowError>;

    // --- Call sessions ---

    /// Insert a dispatched session if and only if its customer has no open
    /// session, setting the customer's open-session marker in the same
    /// transaction. A follow-up session also completes its callback.
    async fn open_call_session(&self, session: &CallSession) -> Result<bool, DialflowError>;

    async fn record_provider_call_id(
        &self,
        id: &CallSessionId,
        provider_call_id: &str,
    ) -> Result<(), DialflowError>;

    /// Conclude an open session as `no_answer` after a dispatch failure,
    /// releasing the guard. Customer counters stay untouched and a consumed
    /// callback returns to `scheduled`.
    async fn fail_call_session(
        &self,
        id: &CallSessionId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DialflowError>;

    /// Stamp the connect time of an open session.
    async fn record_connected(
        &self,
        id: &CallSessionId,
        at: DateTime<Utc>,
    ) -> Result<bool, DialflowError>;

    async fn get_call_session(
        &self,
        id: &CallSessionId,
    ) -> Result<Option<CallSession>, DialflowError>;

    async fn list_open_sessions(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<CallSession>, DialflowError>;

    /// Sessions dispatched for an agent at or after `since`.
    async fn count_dispatches_since(
        &self,
        agent_id: &AgentId,
        since: DateTime<Utc>,
    ) -> Result<u64, DialflowError>;

    /// Apply a concluded call atomically. Returns `false` if the session was
    /// already concluded.
    async fn apply_outcome(&self, update: &OutcomeUpdate) -> Result<bool, DialflowError>;

    // --- Callbacks ---

    /// Callbacks still `scheduled` for an agent, across all campaigns.
    async fn list_pending_callbacks(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<ScheduledCallback>, DialflowError>;

    async fn cancel_callback(&self, id: &CallbackId) -> Result<bool, DialflowError>;

    /// Detach a campaign's scheduled callbacks so they fall back to the
    /// agent's scope. Returns how many were moved.
    async fn release_campaign_callbacks(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<u64, DialflowError>;
}
