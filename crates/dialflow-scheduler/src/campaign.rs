// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign creation, control actions, edits, and statistics.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dialflow_config::model::CampaignDefaultsConfig;
use dialflow_core::types::{
    AgentId, Campaign, CampaignAction, CampaignId, CampaignStatus, CustomerFilter, InterestLevel,
    TimeWindow,
};
use dialflow_core::{Clock, DialflowError, StorageAdapter};
use serde::Serialize;
use tracing::{info, warn};

use crate::selector::{callbacks_for_campaign, enroll_pool};

/// Attempts made when a compare-and-set status change loses a race.
const TRANSITION_ATTEMPTS: usize = 3;

/// Label given to campaigns created without an explicit type.
pub const DEFAULT_CAMPAIGN_TYPE: &str = "general";

/// Definition of a campaign to create.
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignSpec {
    pub name: String,
    pub campaign_type: String,
    pub agent_id: AgentId,
    pub calls_per_hour: u32,
    pub window: TimeWindow,
    pub filter: CustomerFilter,
    pub start_immediately: bool,
}

impl CampaignSpec {
    /// A spec populated from `[campaign_defaults]`.
    pub fn from_defaults(
        name: impl Into<String>,
        agent_id: AgentId,
        defaults: &CampaignDefaultsConfig,
    ) -> Result<Self, DialflowError> {
        Ok(Self {
            name: name.into(),
            campaign_type: DEFAULT_CAMPAIGN_TYPE.to_string(),
            agent_id,
            calls_per_hour: defaults.calls_per_hour,
            window: TimeWindow::parse(&defaults.start_time, &defaults.end_time)?,
            filter: default_filter(defaults),
            start_immediately: false,
        })
    }

    pub fn validate(&self) -> Result<(), DialflowError> {
        if self.name.trim().is_empty() {
            return Err(DialflowError::InvalidCampaign("name must not be empty".into()));
        }
        validate_campaign_type(&self.campaign_type)?;
        validate_definition(self.calls_per_hour, &self.window, &self.filter)
    }
}

/// The customer filter described by `[campaign_defaults]`.
pub fn default_filter(defaults: &CampaignDefaultsConfig) -> CustomerFilter {
    CustomerFilter {
        interest_levels: defaults.interest_levels.clone(),
        max_days_since_last_call: defaults.max_days_since_last_call,
        max_customers: defaults.max_customers,
    }
}

fn validate_campaign_type(campaign_type: &str) -> Result<(), DialflowError> {
    if campaign_type.trim().is_empty() {
        return Err(DialflowError::InvalidCampaign("campaign_type must not be empty".into()));
    }
    Ok(())
}

/// Reject a rate, window, or filter that could never produce a dispatch.
pub fn validate_definition(
    calls_per_hour: u32,
    window: &TimeWindow,
    filter: &CustomerFilter,
) -> Result<(), DialflowError> {
    if calls_per_hour == 0 {
        return Err(DialflowError::InvalidCampaign(
            "calls_per_hour must be greater than 0".into(),
        ));
    }
    if window.is_inverted() {
        return Err(DialflowError::InvalidCampaign(format!(
            "window end {} must be after start {}",
            window.end, window.start
        )));
    }
    if filter.interest_levels.is_empty() {
        return Err(DialflowError::InvalidCampaign(
            "interest_levels must not be empty".into(),
        ));
    }
    if filter.interest_levels.contains(&InterestLevel::Converted) {
        return Err(DialflowError::InvalidCampaign(
            "converted customers are never called; remove it from interest_levels".into(),
        ));
    }
    if filter.max_customers == 0 {
        return Err(DialflowError::InvalidCampaign(
            "max_customers must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Changes to a draft or paused campaign. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CampaignEdit {
    pub name: Option<String>,
    pub campaign_type: Option<String>,
    pub calls_per_hour: Option<u32>,
    pub window: Option<TimeWindow>,
    pub filter: Option<CustomerFilter>,
}

/// Read-only view of campaign progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignStats {
    pub campaign: Campaign,
    pub pool_size: usize,
    pub open_sessions: u64,
    pub pending_callbacks: usize,
    /// Successful calls as a percentage of completed calls.
    pub success_rate: f64,
    pub last_dispatch: Option<DateTime<Utc>>,
}

/// Creates campaigns and applies lifecycle actions.
pub struct CampaignManager {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
}

impl CampaignManager {
    pub fn new(storage: Arc<dyn StorageAdapter>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Validate, enroll the pool, and store a new campaign.
    ///
    /// The campaign starts as `draft` and is launched straight away when
    /// `start_immediately` is set.
    pub async fn create(&self, spec: CampaignSpec) -> Result<Campaign, DialflowError> {
        spec.validate()?;
        if self.storage.get_agent(&spec.agent_id).await?.is_none() {
            return Err(DialflowError::not_found("agent", &spec.agent_id));
        }

        let now = self.clock.now();
        let customers = self.storage.list_customers(&spec.agent_id).await?;
        let pool = enroll_pool(&spec.filter, &customers, now);

        let campaign = Campaign {
            id: CampaignId::generate(),
            agent_id: spec.agent_id,
            name: spec.name,
            campaign_type: spec.campaign_type.trim().to_string(),
            status: CampaignStatus::Draft,
            calls_per_hour: spec.calls_per_hour,
            window: spec.window,
            filter: spec.filter,
            start_immediately: spec.start_immediately,
            calls_completed: 0,
            successful_calls: 0,
            conversions: 0,
            created_at: now,
            updated_at: now,
        };
        self.storage.create_campaign(&campaign, &pool).await?;
        info!(
            campaign_id = %campaign.id,
            name = %campaign.name,
            pool = pool.len(),
            "campaign created"
        );

        if campaign.start_immediately {
            return self.launch(&campaign.id).await;
        }
        Ok(campaign)
    }

    pub async fn launch(&self, id: &CampaignId) -> Result<Campaign, DialflowError> {
        self.transition(id, CampaignAction::Launch).await
    }

    pub async fn pause(&self, id: &CampaignId) -> Result<Campaign, DialflowError> {
        self.transition(id, CampaignAction::Pause).await
    }

    pub async fn resume(&self, id: &CampaignId) -> Result<Campaign, DialflowError> {
        self.transition(id, CampaignAction::Resume).await
    }

    pub async fn stop(&self, id: &CampaignId) -> Result<Campaign, DialflowError> {
        self.transition(id, CampaignAction::Stop).await
    }

    /// Apply a lifecycle action with compare-and-set on the prior status.
    pub async fn transition(
        &self,
        id: &CampaignId,
        action: CampaignAction,
    ) -> Result<Campaign, DialflowError> {
        for _ in 0..TRANSITION_ATTEMPTS {
            let mut campaign = self.require(id).await?;
            let from = campaign.status;
            let to = from.apply(action)?;
            let now = self.clock.now();

            if self.storage.transition_campaign(id, from, to, now).await? {
                info!(campaign_id = %id, %from, %to, "campaign {action}");
                if to == CampaignStatus::Cancelled {
                    let released = self.storage.release_campaign_callbacks(id).await?;
                    if released > 0 {
                        info!(campaign_id = %id, released, "pending callbacks handed back to agent");
                    }
                }
                campaign.status = to;
                campaign.updated_at = now;
                return Ok(campaign);
            }
            warn!(campaign_id = %id, %from, %action, "campaign status changed concurrently, retrying");
        }
        Err(DialflowError::Internal(format!(
            "campaign {id} kept changing status while applying {action}"
        )))
    }

    /// Change the definition of a draft or paused campaign.
    /// The pool is re-enrolled against the resulting filter.
    pub async fn edit(
        &self,
        id: &CampaignId,
        edit: CampaignEdit,
    ) -> Result<Campaign, DialflowError> {
        let mut campaign = self.require(id).await?;
        if !campaign.status.is_editable() {
            return Err(DialflowError::InvalidTransition {
                from: campaign.status.to_string(),
                action: "edit".into(),
            });
        }

        if let Some(name) = edit.name {
            if name.trim().is_empty() {
                return Err(DialflowError::InvalidCampaign("name must not be empty".into()));
            }
            campaign.name = name;
        }
        if let Some(campaign_type) = edit.campaign_type {
            validate_campaign_type(&campaign_type)?;
            campaign.campaign_type = campaign_type.trim().to_string();
        }
        if let Some(rate) = edit.calls_per_hour {
            campaign.calls_per_hour = rate;
        }
        if let Some(window) = edit.window {
            campaign.window = window;
        }
        if let Some(filter) = edit.filter {
            campaign.filter = filter;
        }
        validate_definition(campaign.calls_per_hour, &campaign.window, &campaign.filter)?;

        let now = self.clock.now();
        campaign.updated_at = now;
        let customers = self.storage.list_customers(&campaign.agent_id).await?;
        let pool = enroll_pool(&campaign.filter, &customers, now);

        if !self.storage.update_campaign_definition(&campaign, &pool).await? {
            let current = self.require(id).await?;
            return Err(DialflowError::InvalidTransition {
                from: current.status.to_string(),
                action: "edit".into(),
            });
        }
        info!(campaign_id = %id, pool = pool.len(), "campaign edited");
        Ok(campaign)
    }

    pub async fn get(&self, id: &CampaignId) -> Result<Campaign, DialflowError> {
        self.require(id).await
    }

    pub async fn list(
        &self,
        status: Option<CampaignStatus>,
    ) -> Result<Vec<Campaign>, DialflowError> {
        self.storage.list_campaigns(status).await
    }

    pub async fn stats(&self, id: &CampaignId) -> Result<CampaignStats, DialflowError> {
        let campaign = self.require(id).await?;
        let pool_size = self.storage.list_campaign_pool(id).await?.len();
        let open_sessions = self.storage.count_open_sessions(id).await?;
        let pending = self.storage.list_pending_callbacks(&campaign.agent_id).await?;
        let pending_callbacks = callbacks_for_campaign(id, &campaign.agent_id, pending).count();
        let last_dispatch = self.storage.last_campaign_dispatch(id).await?;

        Ok(CampaignStats {
            success_rate: campaign.success_rate(),
            campaign,
            pool_size,
            open_sessions,
            pending_callbacks,
            last_dispatch,
        })
    }

    async fn require(&self, id: &CampaignId) -> Result<Campaign, DialflowError> {
        self.storage
            .get_campaign(id)
            .await?
            .ok_or_else(|| DialflowError::not_found("campaign", id))
    }
}
