// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns one permit into at most one outbound call.
//!
//! Each dispatch goes through the storage guard before the telephony
//! provider is contacted: if the customer already has an open session the
//! guard rejects the claim and nothing is dialled. Provider failures conclude
//! the session on the spot and release the guard.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use dialflow_core::types::{
    AgentId, CallSession, CallSessionId, CallType, CampaignId, CampaignStatus, Customer,
    CustomerFilter, CustomerId, ScheduledCallback,
};
use dialflow_core::{CallRequest, DialflowError, StorageAdapter, TelephonyAdapter};
use tracing::{debug, info, warn};

use crate::selector::{
    Candidate, Tier, callbacks_for_campaign, held_by_open_session, rank_candidates,
    select_candidate,
};
use crate::ticker::{local_day_start, wall_clock_offset};

/// A call handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub session_id: CallSessionId,
    pub customer_id: CustomerId,
    pub call_type: CallType,
    pub provider_call_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Nobody is eligible right now, but work remains.
    NoCandidate,
    /// Another dispatch holds the customer's open session.
    GuardRejected,
    DailyCapReached,
    AgentPaused,
    /// Immediate target is do-not-call, converted, or archived.
    NotCallable,
}

/// Result of one dispatcher invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Dispatched(DispatchRecord),
    /// The provider failed; the session was concluded as `no_answer`.
    DispatchFailed {
        session_id: CallSessionId,
        reason: String,
    },
    Skipped(SkipReason),
    /// The pool is exhausted and the campaign moved to `completed`.
    Completed,
    /// The campaign is not active.
    Inactive,
}

/// Who to call for an on-demand dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImmediateTarget {
    /// Explicit numbers; unknown ones are added to the directory.
    Phones(Vec<String>),
    /// The best `n` candidates among all of the agent's customers.
    Next(usize),
}

pub struct Dispatcher {
    storage: Arc<dyn StorageAdapter>,
    telephony: Arc<dyn TelephonyAdapter>,
    dispatch_timeout: Duration,
    immediate_filter: CustomerFilter,
    day_offset: FixedOffset,
}

impl Dispatcher {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        telephony: Arc<dyn TelephonyAdapter>,
        dispatch_timeout: Duration,
        immediate_filter: CustomerFilter,
    ) -> Self {
        Self {
            storage,
            telephony,
            dispatch_timeout,
            immediate_filter,
            day_offset: Utc.fix(),
        }
    }

    /// Count daily caps from wall-clock midnight at this offset instead of
    /// UTC midnight, matching the campaign windows.
    pub fn with_utc_offset(mut self, utc_offset_minutes: i32) -> Result<Self, DialflowError> {
        self.day_offset = wall_clock_offset(utc_offset_minutes)?;
        Ok(self)
    }

    /// Handle one permit for a campaign.
    pub async fn tick(
        &self,
        campaign_id: &CampaignId,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, DialflowError> {
        let Some(campaign) = self.storage.get_campaign(campaign_id).await? else {
            return Err(DialflowError::not_found("campaign", campaign_id));
        };
        if campaign.status != CampaignStatus::Active {
            return Ok(TickOutcome::Inactive);
        }
        let agent = self
            .storage
            .get_agent(&campaign.agent_id)
            .await?
            .ok_or_else(|| DialflowError::not_found("agent", &campaign.agent_id))?;
        if !agent.can_dispatch() {
            debug!(campaign_id = %campaign_id, agent_id = %agent.id, "agent paused, skipping tick");
            return Ok(TickOutcome::Skipped(SkipReason::AgentPaused));
        }

        let pool = self.storage.list_campaign_pool(campaign_id).await?;
        let pending = self.storage.list_pending_callbacks(&campaign.agent_id).await?;
        let pending: Vec<ScheduledCallback> =
            callbacks_for_campaign(campaign_id, &campaign.agent_id, pending).collect();
        let callbacks = self.pair_callbacks(&pool, pending).await?;

        let Some(candidate) = select_candidate(&campaign.filter, &pool, &callbacks, now) else {
            let held = held_by_open_session(&campaign.filter, &pool, now);
            return self
                .finish_if_exhausted(campaign_id, &callbacks, held, now)
                .await;
        };

        if self.daily_cap_reached(&agent.id, agent.max_daily_calls, now).await? {
            debug!(campaign_id = %campaign_id, "daily call cap reached");
            return Ok(TickOutcome::Skipped(SkipReason::DailyCapReached));
        }

        let call_type = if candidate.tier.is_callback() {
            CallType::Followup
        } else {
            CallType::Scheduled
        };
        self.dispatch(candidate, Some(campaign_id.clone()), call_type, now)
            .await
    }

    /// Place calls outside any campaign. Each call is checked against the
    /// agent's daily cap; once it is reached the remaining targets are skipped.
    pub async fn dispatch_immediate(
        &self,
        agent_id: &AgentId,
        target: ImmediateTarget,
        now: DateTime<Utc>,
    ) -> Result<Vec<TickOutcome>, DialflowError> {
        let agent = self
            .storage
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| DialflowError::not_found("agent", agent_id))?;
        if !agent.can_dispatch() {
            return Ok(vec![TickOutcome::Skipped(SkipReason::AgentPaused)]);
        }

        let candidates: Vec<Option<Candidate>> = match target {
            ImmediateTarget::Phones(numbers) => {
                let mut resolved = Vec::with_capacity(numbers.len());
                for number in numbers {
                    let number = number.trim().to_string();
                    if number.is_empty() {
                        return Err(DialflowError::InvalidInput(
                            "phone number must not be empty".into(),
                        ));
                    }
                    let customer = self
                        .storage
                        .upsert_customer(&Customer::new(agent_id.clone(), &number, &number, now))
                        .await?;
                    resolved.push(customer.is_callable().then(|| Candidate {
                        customer,
                        tier: Tier::Fresh,
                        callback: None,
                    }));
                }
                resolved
            }
            ImmediateTarget::Next(n) => {
                let customers = self.storage.list_customers(agent_id).await?;
                let pending = self.storage.list_pending_callbacks(agent_id).await?;
                let callbacks = self.pair_callbacks(&customers, pending).await?;
                rank_candidates(&self.immediate_filter, &customers, &callbacks, now)
                    .into_iter()
                    .take(n)
                    .map(Some)
                    .collect()
            }
        };

        let mut outcomes = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let Some(candidate) = candidate else {
                outcomes.push(TickOutcome::Skipped(SkipReason::NotCallable));
                continue;
            };
            if self.daily_cap_reached(agent_id, agent.max_daily_calls, now).await? {
                outcomes.push(TickOutcome::Skipped(SkipReason::DailyCapReached));
                break;
            }
            outcomes.push(self.dispatch(candidate, None, CallType::Immediate, now).await?);
        }
        Ok(outcomes)
    }

    async fn dispatch(
        &self,
        candidate: Candidate,
        campaign_id: Option<CampaignId>,
        call_type: CallType,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, DialflowError> {
        let customer = candidate.customer;
        let callback_id = candidate.callback.map(|cb| cb.id);
        let session = CallSession::dispatched(&customer, campaign_id, callback_id, call_type, now);

        if !self.storage.open_call_session(&session).await? {
            warn!(
                customer_id = %customer.id,
                session_id = %session.id,
                "customer already has an open call, skipping dispatch"
            );
            return Ok(TickOutcome::Skipped(SkipReason::GuardRejected));
        }

        let request = CallRequest {
            session_id: session.id.clone(),
            agent_id: session.agent_id.clone(),
            customer_id: customer.id.clone(),
            campaign_id: session.campaign_id.clone(),
            call_type,
            phone_number: customer.phone_number.clone(),
            customer_name: customer.name.clone(),
        };

        let result = match tokio::time::timeout(
            self.dispatch_timeout,
            self.telephony.dispatch_call(&request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DialflowError::Timeout {
                duration: self.dispatch_timeout,
            }),
        };

        match result {
            Ok(provider_call_id) => {
                self.storage
                    .record_provider_call_id(&session.id, &provider_call_id)
                    .await?;
                info!(
                    session_id = %session.id,
                    customer_id = %customer.id,
                    campaign_id = ?session.campaign_id.as_ref().map(|c| c.as_str()),
                    %call_type,
                    %provider_call_id,
                    "call dispatched"
                );
                Ok(TickOutcome::Dispatched(DispatchRecord {
                    session_id: session.id,
                    customer_id: customer.id,
                    call_type,
                    provider_call_id,
                }))
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(
                    session_id = %session.id,
                    customer_id = %customer.id,
                    error = %reason,
                    "call dispatch failed"
                );
                self.storage
                    .fail_call_session(&session.id, &reason, now)
                    .await?;
                Ok(TickOutcome::DispatchFailed {
                    session_id: session.id,
                    reason,
                })
            }
        }
    }

    /// Complete the campaign when nothing is left to wait for: no open
    /// sessions, no pending callback for a callable customer, and no pool
    /// customer held by a call from elsewhere.
    async fn finish_if_exhausted(
        &self,
        campaign_id: &CampaignId,
        callbacks: &[(ScheduledCallback, Customer)],
        held: usize,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, DialflowError> {
        let open = self.storage.count_open_sessions(campaign_id).await?;
        let waiting = callbacks
            .iter()
            .filter(|(cb, customer)| cb.is_pending() && customer.is_callable())
            .count();
        if open > 0 || waiting > 0 || held > 0 {
            debug!(campaign_id = %campaign_id, open, waiting, held, "no candidate this tick");
            return Ok(TickOutcome::Skipped(SkipReason::NoCandidate));
        }

        if self
            .storage
            .transition_campaign(campaign_id, CampaignStatus::Active, CampaignStatus::Completed, now)
            .await?
        {
            info!(campaign_id = %campaign_id, "campaign pool exhausted, completed");
            Ok(TickOutcome::Completed)
        } else {
            Ok(TickOutcome::Inactive)
        }
    }

    async fn daily_cap_reached(
        &self,
        agent_id: &AgentId,
        max_daily_calls: u32,
        now: DateTime<Utc>,
    ) -> Result<bool, DialflowError> {
        let day_start = local_day_start(now, self.day_offset);
        let placed = self.storage.count_dispatches_since(agent_id, day_start).await?;
        Ok(placed >= u64::from(max_daily_calls))
    }

    /// Attach each callback's customer, loading customers not in `known`.
    async fn pair_callbacks(
        &self,
        known: &[Customer],
        callbacks: Vec<ScheduledCallback>,
    ) -> Result<Vec<(ScheduledCallback, Customer)>, DialflowError> {
        let mut customers: HashMap<CustomerId, Customer> = known
            .iter()
            .map(|c| (c.id.clone(), c.clone()))
            .collect();
        let mut paired = Vec::with_capacity(callbacks.len());
        for callback in callbacks {
            if !customers.contains_key(&callback.customer_id) {
                match self.storage.get_customer(&callback.customer_id).await? {
                    Some(customer) => {
                        customers.insert(customer.id.clone(), customer);
                    }
                    None => continue,
                }
            }
            if let Some(customer) = customers.get(&callback.customer_id) {
                paired.push((callback, customer.clone()));
            }
        }
        Ok(paired)
    }
}
