// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Folds the outcome of a concluded call back into the customer directory.
//!
//! This is the only place that changes a customer's interest level or
//! creates scheduled callbacks. All writes for one outcome are applied in a
//! single storage transaction, and a second report for the same session is a
//! successful no-op.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dialflow_config::InterestPolicy;
use dialflow_config::model::SchedulerConfig;
use dialflow_core::types::{
    CallNote, CallOutcome, CallSessionId, CallbackId, CallbackStatus, CustomerUpdate,
    InterestLevel, Objection, OutcomeUpdate, ScheduledCallback,
};
use dialflow_core::{Clock, DialflowError, StorageAdapter};
use tracing::{debug, info};

pub const DEFAULT_CALLBACK_REASON: &str = "customer requested callback";

/// Satisfaction scores are ratings from 1 to this value.
pub const MAX_SATISFACTION: u8 = 5;

/// A finished call as reported by the conversation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeReport {
    pub session_id: CallSessionId,
    pub outcome: CallOutcome,
    /// When the customer picked up, if not already recorded.
    pub connected_at: Option<DateTime<Utc>>,
    /// Defaults to the time of ingestion.
    pub ended_at: Option<DateTime<Utc>>,
    pub callback_at: Option<DateTime<Utc>>,
    pub callback_reason: Option<String>,
    /// Customer rating, 1 to [`MAX_SATISFACTION`].
    pub satisfaction: Option<u8>,
    pub notes: Option<String>,
    /// `(objection, response)` pairs raised during the call.
    pub objections: Vec<(String, String)>,
}

impl OutcomeReport {
    pub fn new(session_id: CallSessionId, outcome: CallOutcome) -> Self {
        Self {
            session_id,
            outcome,
            connected_at: None,
            ended_at: None,
            callback_at: None,
            callback_reason: None,
            satisfaction: None,
            notes: None,
            objections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestResult {
    Applied {
        before: InterestLevel,
        after: InterestLevel,
        callback_id: Option<CallbackId>,
    },
    /// The session was concluded earlier; nothing changed.
    AlreadyConcluded,
}

/// New interest level after a call.
///
/// `converted` is terminal and a `converted` outcome always forces it. Under
/// the stepwise policy positive outcomes move one step toward `hot` and
/// `not_interested` one step toward `cold`; the direct policy jumps straight
/// to `hot` or `cold` for `interested` and `not_interested`.
pub fn shift_interest(
    policy: InterestPolicy,
    level: InterestLevel,
    outcome: CallOutcome,
) -> InterestLevel {
    if level.is_terminal() || outcome == CallOutcome::Converted {
        return InterestLevel::Converted;
    }
    match (policy, outcome) {
        (InterestPolicy::Stepwise, CallOutcome::Interested) => level.raised(),
        (InterestPolicy::Direct, CallOutcome::Interested) => InterestLevel::Hot,
        (_, CallOutcome::CallbackRequested) => level.raised(),
        (InterestPolicy::Stepwise, CallOutcome::NotInterested) => level.lowered(),
        (InterestPolicy::Direct, CallOutcome::NotInterested) => InterestLevel::Cold,
        _ => level,
    }
}

pub struct Learner {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    policy: InterestPolicy,
    default_callback_delay: Duration,
}

impl Learner {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            clock,
            policy: config.interest_policy,
            default_callback_delay: Duration::hours(i64::from(config.default_callback_delay_hours)),
        }
    }

    pub async fn ingest(&self, report: OutcomeReport) -> Result<IngestResult, DialflowError> {
        if let Some(score) = report.satisfaction {
            if !(1..=MAX_SATISFACTION).contains(&score) {
                return Err(DialflowError::InvalidInput(format!(
                    "satisfaction must be between 1 and {MAX_SATISFACTION}, got {score}"
                )));
            }
        }

        let session = self
            .storage
            .get_call_session(&report.session_id)
            .await?
            .ok_or_else(|| DialflowError::not_found("call session", &report.session_id))?;
        if !session.is_open() {
            debug!(session_id = %session.id, "outcome already recorded, ignoring");
            return Ok(IngestResult::AlreadyConcluded);
        }
        let customer = self
            .storage
            .get_customer(&session.customer_id)
            .await?
            .ok_or_else(|| DialflowError::not_found("customer", &session.customer_id))?;

        let now = self.clock.now();
        let connected_at = report
            .connected_at
            .or(session.connected_at)
            .map(|at| at.max(session.dispatched_at));
        let ended_at = report
            .ended_at
            .unwrap_or(now)
            .max(connected_at.unwrap_or(session.dispatched_at));
        let duration_seconds = connected_at.map_or(0, |at| {
            u32::try_from((ended_at - at).num_seconds()).unwrap_or(u32::MAX)
        });

        let before = customer.interest_level;
        let after = shift_interest(self.policy, before, report.outcome);

        let wants_callback = report.outcome == CallOutcome::CallbackRequested
            || (report.callback_at.is_some() && !after.is_terminal());
        let callback = wants_callback.then(|| ScheduledCallback {
            id: CallbackId::generate(),
            agent_id: session.agent_id.clone(),
            customer_id: session.customer_id.clone(),
            campaign_id: session.campaign_id.clone(),
            scheduled_for: report
                .callback_at
                .unwrap_or(now + self.default_callback_delay),
            reason: report
                .callback_reason
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CALLBACK_REASON.to_string()),
            priority: if after == InterestLevel::Hot { 3 } else { 2 },
            status: CallbackStatus::Scheduled,
            created_at: now,
            completed_at: None,
        });

        let new_objections = report
            .objections
            .into_iter()
            .map(|(objection, response)| Objection {
                objection,
                response,
                recorded_at: now,
            })
            .collect();
        let new_note = report.notes.clone().map(|note| CallNote {
            outcome: report.outcome,
            note,
            recorded_at: now,
        });

        let update = OutcomeUpdate {
            session_id: session.id.clone(),
            agent_id: session.agent_id.clone(),
            customer_id: session.customer_id.clone(),
            campaign_id: session.campaign_id.clone(),
            outcome: report.outcome,
            connected_at,
            ended_at,
            duration_seconds,
            notes: report.notes,
            customer: CustomerUpdate {
                interest_level: after,
                successful: report.outcome.is_successful(),
                last_interaction: now,
                next_followup: callback.as_ref().map(|cb| cb.scheduled_for),
                new_objections,
                new_note,
            },
            callback,
            satisfaction: report.satisfaction,
        };
        let callback_id = update.callback.as_ref().map(|cb| cb.id.clone());

        if !self.storage.apply_outcome(&update).await? {
            debug!(session_id = %session.id, "session concluded concurrently, ignoring");
            return Ok(IngestResult::AlreadyConcluded);
        }

        info!(
            session_id = %session.id,
            customer_id = %session.customer_id,
            outcome = %report.outcome,
            %before,
            %after,
            duration_seconds,
            callback = callback_id.is_some(),
            "call outcome recorded"
        );
        Ok(IngestResult::Applied {
            before,
            after,
            callback_id,
        })
    }

    /// Stamp when an open call was answered. Returns `false` for a concluded
    /// session or one whose connect time is already set.
    pub async fn record_connected(
        &self,
        session_id: &CallSessionId,
        at: DateTime<Utc>,
    ) -> Result<bool, DialflowError> {
        let session = self
            .storage
            .get_call_session(session_id)
            .await?
            .ok_or_else(|| DialflowError::not_found("call session", session_id))?;
        if !session.is_open() {
            return Ok(false);
        }
        self.storage
            .record_connected(session_id, at.max(session.dispatched_at))
            .await
    }
}
