// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use dialflow_config::model::StorageConfig;
use dialflow_core::types::{
    Agent, AgentId, AgentStatus, CallSession, CallSessionId, CallbackId, Campaign, CampaignId,
    CampaignStatus, Customer, CustomerId, OutcomeUpdate, ScheduledCallback,
};
use dialflow_core::{AdapterType, DialflowError, HealthStatus, PluginAdapter, StorageAdapter};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// method fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, DialflowError> {
        self.db.get().ok_or_else(|| DialflowError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, DialflowError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), DialflowError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), DialflowError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| DialflowError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), DialflowError> {
        self.db()?.checkpoint().await
    }

    // --- Agents ---

    async fn create_agent(&self, agent: &Agent) -> Result<(), DialflowError> {
        queries::agents::create_agent(self.db()?, agent).await
    }

    async fn get_agent(&self, id: &AgentId) -> Result<Option<Agent>, DialflowError> {
        queries::agents::get_agent(self.db()?, id).await
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, DialflowError> {
        queries::agents::list_agents(self.db()?).await
    }

    async fn set_agent_status(
        &self,
        id: &AgentId,
        status: AgentStatus,
    ) -> Result<bool, DialflowError> {
        queries::agents::set_agent_status(self.db()?, id, status).await
    }

    // --- Customers ---

    async fn upsert_customer(&self, customer: &Customer) -> Result<Customer, DialflowError> {
        queries::customers::upsert_customer(self.db()?, customer).await
    }

    async fn get_customer(&self, id: &CustomerId) -> Result<Option<Customer>, DialflowError> {
        queries::customers::get_customer(self.db()?, id).await
    }

    async fn find_customer_by_phone(
        &self,
        agent_id: &AgentId,
        phone_number: &str,
    ) -> Result<Option<Customer>, DialflowError> {
        queries::customers::find_customer_by_phone(self.db()?, agent_id, phone_number).await
    }

    async fn list_customers(&self, agent_id: &AgentId) -> Result<Vec<Customer>, DialflowError> {
        queries::customers::list_customers(self.db()?, agent_id).await
    }

    async fn set_do_not_call(&self, id: &CustomerId, flag: bool) -> Result<bool, DialflowError> {
        queries::customers::set_do_not_call(self.db()?, id, flag).await
    }

    async fn archive_customer(
        &self,
        id: &CustomerId,
        at: DateTime<Utc>,
    ) -> Result<bool, DialflowError> {
        queries::customers::archive_customer(self.db()?, id, at).await
    }

    // --- Campaigns ---

    async fn create_campaign(
        &self,
        campaign: &Campaign,
        pool: &[CustomerId],
    ) -> Result<(), DialflowError> {
        queries::campaigns::create_campaign(self.db()?, campaign, pool).await
    }

    async fn get_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, DialflowError> {
        queries::campaigns::get_campaign(self.db()?, id).await
    }

    async fn list_campaigns(
        &self,
        status: Option<CampaignStatus>,
    ) -> Result<Vec<Campaign>, DialflowError> {
        queries::campaigns::list_campaigns(self.db()?, status).await
    }

    async fn transition_campaign(
        &self,
        id: &CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, DialflowError> {
        queries::campaigns::transition_campaign(self.db()?, id, from, to, at).await
    }

    async fn update_campaign_definition(
        &self,
        campaign: &Campaign,
        pool: &[CustomerId],
    ) -> Result<bool, DialflowError> {
        queries::campaigns::update_campaign_definition(self.db()?, campaign, pool).await
    }

    async fn list_campaign_pool(&self, id: &CampaignId) -> Result<Vec<Customer>, DialflowError> {
        queries::campaigns::list_campaign_pool(self.db()?, id).await
    }

    async fn count_open_sessions(&self, id: &CampaignId) -> Result<u64, DialflowError> {
        queries::campaigns::count_open_sessions(self.db()?, id).await
    }

    async fn last_campaign_dispatch(
        &self,
        id: &CampaignId,
    ) -> Result<Option<DateTime<Utc>>, DialflowError> {
        queries::campaigns::last_campaign_dispatch(self.db()?, id).await
    }

    // --- Call sessions ---

    async fn open_call_session(&self, session: &CallSession) -> Result<bool, DialflowError> {
        queries::calls::open_call_session(self.db()?, session).await
    }

    async fn record_provider_call_id(
        &self,
        id: &CallSessionId,
        provider_call_id: &str,
    ) -> Result<(), DialflowError> {
        queries::calls::record_provider_call_id(self.db()?, id, provider_call_id).await
    }

    async fn fail_call_session(
        &self,
        id: &CallSessionId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, DialflowError> {
        queries::calls::fail_call_session(self.db()?, id, reason, at).await
    }

    async fn record_connected(
        &self,
        id: &CallSessionId,
        at: DateTime<Utc>,
    ) -> Result<bool, DialflowError> {
        queries::calls::record_connected(self.db()?, id, at).await
    }

    async fn get_call_session(
        &self,
        id: &CallSessionId,
    ) -> Result<Option<CallSession>, DialflowError> {
        queries::calls::get_call_session(self.db()?, id).await
    }

    async fn list_open_sessions(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<CallSession>, DialflowError> {
        queries::calls::list_open_sessions(self.db()?, agent_id).await
    }

    async fn count_dispatches_since(
        &self,
        agent_id: &AgentId,
        since: DateTime<Utc>,
    ) -> Result<u64, DialflowError> {
        queries::calls::count_dispatches_since(self.db()?, agent_id, since).await
    }

    async fn apply_outcome(&self, update: &OutcomeUpdate) -> Result<bool, DialflowError> {
        queries::calls::apply_outcome(self.db()?, update).await
    }

    // --- Callbacks ---

    async fn list_pending_callbacks(
        &self,
        agent_id: &AgentId,
    ) -> Result<Vec<ScheduledCallback>, DialflowError> {
        queries::callbacks::list_pending_callbacks(self.db()?, agent_id).await
    }

    async fn cancel_callback(&self, id: &CallbackId) -> Result<bool, DialflowError> {
        queries::callbacks::cancel_callback(self.db()?, id).await
    }

    async fn release_campaign_callbacks(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<u64, DialflowError> {
        queries::callbacks::release_campaign_callbacks(self.db()?, campaign_id).await
    }
}
