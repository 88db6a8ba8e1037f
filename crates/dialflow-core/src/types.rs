// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the scheduler, storage, and telephony crates.
//!
//! Entities mirror the persisted data model: [`Agent`], [`Customer`],
//! [`Campaign`], [`CallSession`], and [`ScheduledCallback`]. Enumerations use
//! snake_case for both their serde and `strum` string forms so the stored
//! column values and configuration values agree.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::DialflowError;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random identifier (UUID v4).
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_type!(
    /// Identifier of the calling agent (one per owning account).
    AgentId
);
id_type!(
    /// Identifier of a customer record.
    CustomerId
);
id_type!(
    /// Identifier of an outbound campaign.
    CampaignId
);
id_type!(
    /// Identifier of a single call attempt.
    CallSessionId
);
id_type!(
    /// Identifier of a scheduled callback.
    CallbackId
);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Telephony,
}

// --- Enumerations ---

/// Coarse customer-engagement signal driving selection priority.
///
/// Variants are declared in ascending order so `Ord` follows
/// `cold < warm < hot < converted`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InterestLevel {
    Cold,
    Warm,
    Hot,
    Converted,
}

impl InterestLevel {
    /// One step toward `hot`. `hot` and `converted` are unchanged.
    pub fn raised(self) -> Self {
        match self {
            Self::Cold => Self::Warm,
            Self::Warm => Self::Hot,
            other => other,
        }
    }

    /// One step toward `cold`. `converted` is terminal and never relaxes.
    pub fn lowered(self) -> Self {
        match self {
            Self::Hot => Self::Warm,
            Self::Warm => Self::Cold,
            other => other,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Converted
    }
}

/// Lifecycle status of a campaign.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
    Cancelled,
}

/// Control actions that move a campaign between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CampaignAction {
    Launch,
    Pause,
    Resume,
    Stop,
    /// Issued by the dispatcher when the pool is exhausted.
    Complete,
}

impl CampaignStatus {
    /// Apply a control action, returning the next status or an
    /// [`DialflowError::InvalidTransition`] if the action is not legal here.
    pub fn apply(self, action: CampaignAction) -> Result<Self, DialflowError> {
        use CampaignAction as A;
        use CampaignStatus as S;

        let next = match (self, action) {
            (S::Draft, A::Launch) => S::Active,
            (S::Active, A::Pause) => S::Paused,
            (S::Paused, A::Resume) => S::Active,
            (S::Active, A::Complete) => S::Completed,
            (S::Draft | S::Active | S::Paused, A::Stop) => S::Cancelled,
            (from, action) => {
                return Err(DialflowError::InvalidTransition {
                    from: from.to_string(),
                    action: action.to_string(),
                });
            }
        };
        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Rate, window, and filter may only change while the campaign is not running.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Paused)
    }
}

/// Why a call was placed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallType {
    /// Placed by a campaign runner on a rate-limiter tick.
    Scheduled,
    /// Placed on demand, outside any campaign.
    Immediate,
    /// Placed to honour a scheduled callback.
    Followup,
}

/// Terminal classification of a concluded call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallOutcome {
    NoAnswer,
    Busy,
    Interested,
    NotInterested,
    CallbackRequested,
    Converted,
}

impl CallOutcome {
    /// Outcomes that count toward a customer's successful call counter.
    pub fn is_successful(self) -> bool {
        matches!(
            self,
            Self::Interested | Self::CallbackRequested | Self::Converted
        )
    }
}

/// Status of a scheduled callback.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CallbackStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// Operating status of a calling agent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentStatus {
    /// Newly created; promoted to `active` once enough calls are handled.
    Learning,
    Active,
    /// No dispatches are issued for a paused agent.
    Paused,
}

/// Number of handled calls after which a learning agent becomes active.
pub const AGENT_ACTIVATION_CALLS: u64 = 10;

// --- Entities ---

/// The calling agent owning customers and campaigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub status: AgentStatus,
    /// Upper bound on dispatches per UTC day across all campaigns and immediate calls.
    pub max_daily_calls: u32,
    pub calls_handled: u64,
    pub conversions: u64,
    pub satisfaction_total: u64,
    pub satisfaction_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: impl Into<String>, max_daily_calls: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: AgentId::generate(),
            name: name.into(),
            status: AgentStatus::Learning,
            max_daily_calls,
            calls_handled: 0,
            conversions: 0,
            satisfaction_total: 0,
            satisfaction_count: 0,
            created_at: now,
        }
    }

    /// Conversions as a percentage of handled calls.
    pub fn conversion_rate(&self) -> f64 {
        if self.calls_handled == 0 {
            return 0.0;
        }
        self.conversions as f64 / self.calls_handled as f64 * 100.0
    }

    pub fn average_satisfaction(&self) -> Option<f64> {
        (self.satisfaction_count > 0)
            .then(|| self.satisfaction_total as f64 / self.satisfaction_count as f64)
    }

    pub fn can_dispatch(&self) -> bool {
        self.status != AgentStatus::Paused
    }
}

/// An objection raised by a customer and the response given to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objection {
    pub objection: String,
    pub response: String,
    pub recorded_at: DateTime<Utc>,
}

/// Free-form note attached to a customer after a concluded call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallNote {
    pub outcome: CallOutcome,
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

/// A customer in the directory of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub agent_id: AgentId,
    /// Unique per owning agent.
    pub phone_number: String,
    pub name: String,
    pub interest_level: InterestLevel,
    pub do_not_call: bool,
    pub last_interaction: Option<DateTime<Utc>>,
    pub next_followup: Option<DateTime<Utc>>,
    pub total_calls: u32,
    pub successful_calls: u32,
    pub objections: Vec<Objection>,
    pub notes: Vec<CallNote>,
    /// Session currently dispatched to this customer and not yet concluded.
    pub open_session_id: Option<CallSessionId>,
    /// Soft-delete marker; archived customers keep their history.
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// A new customer as created by import or first contact (interest `warm`).
    pub fn new(
        agent_id: AgentId,
        phone_number: impl Into<String>,
        name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CustomerId::generate(),
            agent_id,
            phone_number: phone_number.into(),
            name: name.into(),
            interest_level: InterestLevel::Warm,
            do_not_call: false,
            last_interaction: None,
            next_followup: None,
            total_calls: 0,
            successful_calls: 0,
            objections: Vec::new(),
            notes: Vec::new(),
            open_session_id: None,
            archived_at: None,
            created_at: now,
        }
    }

    pub fn with_interest(mut self, level: InterestLevel) -> Self {
        self.interest_level = level;
        self
    }

    /// Whether any call may be placed to this customer at all.
    pub fn is_callable(&self) -> bool {
        !self.do_not_call && !self.interest_level.is_terminal() && self.archived_at.is_none()
    }

    /// Never reached by a concluded call.
    pub fn is_fresh(&self) -> bool {
        self.total_calls == 0
    }

    pub fn has_open_session(&self) -> bool {
        self.open_session_id.is_some()
    }
}

/// Daily dispatch window in wall-clock time, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse `HH:MM` (or `HH:MM:SS`) bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self, DialflowError> {
        Ok(Self::new(parse_wall_clock(start)?, parse_wall_clock(end)?))
    }

    /// A window that closes at or before it opens never issues a permit.
    pub fn is_inverted(&self) -> bool {
        self.end <= self.start
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }
}

fn parse_wall_clock(value: &str) -> Result<NaiveTime, DialflowError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|e| DialflowError::InvalidInput(format!("invalid time of day `{value}`: {e}")))
}

/// Pool selection criteria of a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerFilter {
    pub interest_levels: Vec<InterestLevel>,
    /// Previously-called customers become eligible again after this many days.
    pub max_days_since_last_call: u32,
    /// Maximum number of customers enrolled into the campaign pool.
    pub max_customers: u32,
}

impl CustomerFilter {
    pub fn matches_level(&self, level: InterestLevel) -> bool {
        self.interest_levels.contains(&level)
    }

    pub fn recontact_after(&self) -> Duration {
        Duration::days(i64::from(self.max_days_since_last_call))
    }
}

/// A configured, rate-limited batch of outbound calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub agent_id: AgentId,
    pub name: String,
    /// Free-form grouping label such as `new_leads` or `renewals`.
    pub campaign_type: String,
    pub status: CampaignStatus,
    /// Target calls per hour, always > 0 for a validated campaign.
    pub calls_per_hour: u32,
    pub window: TimeWindow,
    pub filter: CustomerFilter,
    pub start_immediately: bool,
    pub calls_completed: u64,
    pub successful_calls: u64,
    pub conversions: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Successful calls as a percentage of completed calls.
    pub fn success_rate(&self) -> f64 {
        if self.calls_completed == 0 {
            return 0.0;
        }
        self.successful_calls as f64 / self.calls_completed as f64 * 100.0
    }
}

/// One call attempt, created at dispatch and concluded exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSession {
    pub id: CallSessionId,
    pub agent_id: AgentId,
    pub customer_id: CustomerId,
    /// `None` for immediate calls.
    pub campaign_id: Option<CampaignId>,
    /// The callback this follow-up call honours, if any.
    pub callback_id: Option<CallbackId>,
    pub call_type: CallType,
    pub phone_number: String,
    pub dispatched_at: DateTime<Utc>,
    pub connected_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub outcome: Option<CallOutcome>,
    pub duration_seconds: u32,
    pub provider_call_id: Option<String>,
    /// Set when the telephony provider rejected the dispatch.
    pub failure_reason: Option<String>,
    pub notes: Option<String>,
}

impl CallSession {
    /// A freshly dispatched session with no connect/end timestamps.
    pub fn dispatched(
        customer: &Customer,
        campaign_id: Option<CampaignId>,
        callback_id: Option<CallbackId>,
        call_type: CallType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CallSessionId::generate(),
            agent_id: customer.agent_id.clone(),
            customer_id: customer.id.clone(),
            campaign_id,
            callback_id,
            call_type,
            phone_number: customer.phone_number.clone(),
            dispatched_at: now,
            connected_at: None,
            ended_at: None,
            outcome: None,
            duration_seconds: 0,
            provider_call_id: None,
            failure_reason: None,
            notes: None,
        }
    }

    /// Dispatched and not yet concluded.
    pub fn is_open(&self) -> bool {
        self.outcome.is_none()
    }
}

/// A callback promised to a customer, served ahead of the regular pool once due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCallback {
    pub id: CallbackId,
    pub agent_id: AgentId,
    pub customer_id: CustomerId,
    pub campaign_id: Option<CampaignId>,
    pub scheduled_for: DateTime<Utc>,
    pub reason: String,
    /// 1 (lowest) to 5 (highest).
    pub priority: u8,
    pub status: CallbackStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScheduledCallback {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == CallbackStatus::Scheduled && self.scheduled_for <= now
    }

    pub fn is_pending(&self) -> bool {
        self.status == CallbackStatus::Scheduled
    }
}

// --- Outcome ingestion ---

/// Customer-side mutations produced by one concluded call.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerUpdate {
    pub interest_level: InterestLevel,
    pub successful: bool,
    pub last_interaction: DateTime<Utc>,
    pub next_followup: Option<DateTime<Utc>>,
    pub new_objections: Vec<Objection>,
    pub new_note: Option<CallNote>,
}

/// Everything written, as one atomic unit, when a call concludes.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeUpdate {
    pub session_id: CallSessionId,
    pub agent_id: AgentId,
    pub customer_id: CustomerId,
    pub campaign_id: Option<CampaignId>,
    pub outcome: CallOutcome,
    pub connected_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: u32,
    pub notes: Option<String>,
    pub customer: CustomerUpdate,
    pub callback: Option<ScheduledCallback>,
    /// Satisfaction score reported for the call, if any.
    pub satisfaction: Option<u8>,
}
