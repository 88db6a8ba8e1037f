// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Picks the next customer to call.
//!
//! Selection is a pure function of the campaign filter, the enrolled pool,
//! the due callbacks (paired with their customers) and the current time. It
//! never touches storage: the dispatcher loads the inputs and the open-session
//! guard in storage remains the authority on whether a call may be placed.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dialflow_core::types::{
    AgentId, CampaignId, Customer, CustomerFilter, CustomerId, ScheduledCallback,
};

/// Callbacks at or above this priority outrank every other candidate.
pub const URGENT_CALLBACK_PRIORITY: u8 = 4;

/// Why a customer is a candidate, in selection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    UrgentCallback,
    Callback,
    Fresh,
    Recontact,
}

impl Tier {
    pub fn is_callback(self) -> bool {
        matches!(self, Self::UrgentCallback | Self::Callback)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub customer: Customer,
    pub tier: Tier,
    /// The callback that produced this candidate, for callback tiers.
    pub callback: Option<ScheduledCallback>,
}

impl Candidate {
    fn priority(&self) -> u8 {
        self.callback.as_ref().map_or(0, |cb| cb.priority)
    }

    fn reference_time(&self) -> DateTime<Utc> {
        self.callback
            .as_ref()
            .map_or(self.customer.created_at, |cb| cb.scheduled_for)
    }

    fn rank(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then_with(|| other.priority().cmp(&self.priority()))
            // `None < Some(_)`: never-contacted customers come first.
            .then_with(|| {
                self.customer
                    .last_interaction
                    .cmp(&other.customer.last_interaction)
            })
            .then_with(|| self.reference_time().cmp(&other.reference_time()))
            .then_with(|| self.customer.id.cmp(&other.customer.id))
    }
}

/// All candidates in selection order, at most one per customer.
pub fn rank_candidates(
    filter: &CustomerFilter,
    pool: &[Customer],
    callbacks: &[(ScheduledCallback, Customer)],
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::with_capacity(pool.len() + callbacks.len());

    for (callback, customer) in callbacks {
        if !callback.is_due(now) || !selectable(customer) {
            continue;
        }
        let tier = if callback.priority >= URGENT_CALLBACK_PRIORITY {
            Tier::UrgentCallback
        } else {
            Tier::Callback
        };
        candidates.push(Candidate {
            customer: customer.clone(),
            tier,
            callback: Some(callback.clone()),
        });
    }

    for customer in pool {
        if !selectable(customer) || !filter.matches_level(customer.interest_level) {
            continue;
        }
        let tier = if customer.is_fresh() {
            Tier::Fresh
        } else if due_for_recontact(filter, customer, now) {
            Tier::Recontact
        } else {
            continue;
        };
        candidates.push(Candidate {
            customer: customer.clone(),
            tier,
            callback: None,
        });
    }

    candidates.sort_by(Candidate::rank);

    let mut seen: HashSet<CustomerId> = HashSet::new();
    candidates.retain(|candidate| seen.insert(candidate.customer.id.clone()));
    candidates
}

/// The single best candidate, if any.
pub fn select_candidate(
    filter: &CustomerFilter,
    pool: &[Customer],
    callbacks: &[(ScheduledCallback, Customer)],
    now: DateTime<Utc>,
) -> Option<Candidate> {
    rank_candidates(filter, pool, callbacks, now).into_iter().next()
}

/// Pool customers that would be candidates if they were not on a call,
/// possibly one placed by another campaign.
pub fn held_by_open_session(filter: &CustomerFilter, pool: &[Customer], now: DateTime<Utc>) -> usize {
    pool.iter()
        .filter(|c| c.is_callable() && c.has_open_session())
        .filter(|c| filter.matches_level(c.interest_level))
        .filter(|c| c.is_fresh() || due_for_recontact(filter, c, now))
        .count()
}

/// Callbacks a campaign serves: its own, plus campaign-less callbacks of its agent.
pub fn callbacks_for_campaign<'a>(
    campaign_id: &'a CampaignId,
    agent_id: &'a AgentId,
    callbacks: impl IntoIterator<Item = ScheduledCallback> + 'a,
) -> impl Iterator<Item = ScheduledCallback> + 'a {
    callbacks.into_iter().filter(move |cb| match &cb.campaign_id {
        Some(id) => id == campaign_id,
        None => &cb.agent_id == agent_id,
    })
}

/// Customers enrolled into a new (or re-filtered) campaign pool.
///
/// Takes callable customers matching the interest filter that are either
/// fresh or due for recontact, in selection order, up to `max_customers`.
pub fn enroll_pool(
    filter: &CustomerFilter,
    customers: &[Customer],
    now: DateTime<Utc>,
) -> Vec<CustomerId> {
    let mut eligible: Vec<&Customer> = customers
        .iter()
        .filter(|c| c.is_callable() && filter.matches_level(c.interest_level))
        .filter(|c| c.is_fresh() || due_for_recontact(filter, c, now))
        .collect();
    eligible.sort_by(|a, b| {
        a.last_interaction
            .cmp(&b.last_interaction)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    eligible
        .into_iter()
        .take(filter.max_customers as usize)
        .map(|c| c.id.clone())
        .collect()
}

fn selectable(customer: &Customer) -> bool {
    customer.is_callable() && !customer.has_open_session()
}

fn due_for_recontact(filter: &CustomerFilter, customer: &Customer, now: DateTime<Utc>) -> bool {
    match customer.last_interaction {
        Some(at) => now - at > filter.recontact_after(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use dialflow_core::types::{
        AgentId, CallSessionId, CallbackId, CallbackStatus, InterestLevel,
    };
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn filter(levels: &[InterestLevel]) -> CustomerFilter {
        CustomerFilter {
            interest_levels: levels.to_vec(),
            max_days_since_last_call: 7,
            max_customers: 50,
        }
    }

    fn customer(id: &str, level: InterestLevel) -> Customer {
        let mut c = Customer::new(AgentId::from("agent"), format!("+1555{id}"), id, now() - Duration::days(30))
            .with_interest(level);
        c.id = CustomerId::from(id);
        c
    }

    fn called(id: &str, level: InterestLevel, days_ago: i64) -> Customer {
        let mut c = customer(id, level);
        c.total_calls = 1;
        c.last_interaction = Some(now() - Duration::days(days_ago));
        c
    }

    fn callback(customer: &Customer, priority: u8, hours_ago: i64) -> (ScheduledCallback, Customer) {
        let cb = ScheduledCallback {
            id: CallbackId::generate(),
            agent_id: customer.agent_id.clone(),
            customer_id: customer.id.clone(),
            campaign_id: None,
            scheduled_for: now() - Duration::hours(hours_ago),
            reason: "customer requested callback".into(),
            priority,
            status: CallbackStatus::Scheduled,
            created_at: now() - Duration::days(3),
            completed_at: None,
        };
        (cb, customer.clone())
    }

    fn pick(filter: &CustomerFilter, pool: &[Customer], callbacks: &[(ScheduledCallback, Customer)]) -> Option<String> {
        select_candidate(filter, pool, callbacks, now()).map(|c| c.customer.id.0)
    }

    #[test]
    fn fresh_before_recontact() {
        let pool = vec![called("old", InterestLevel::Warm, 20), customer("new", InterestLevel::Warm)];
        assert_eq!(pick(&filter(&[InterestLevel::Warm]), &pool, &[]).as_deref(), Some("new"));
    }

    #[test]
    fn recently_called_customers_are_not_candidates() {
        let pool = vec![called("recent", InterestLevel::Warm, 2)];
        assert!(pick(&filter(&[InterestLevel::Warm]), &pool, &[]).is_none());
    }

    #[test]
    fn recontact_orders_by_longest_silence() {
        let pool = vec![
            called("ten", InterestLevel::Hot, 10),
            called("thirty", InterestLevel::Hot, 30),
        ];
        let ranked = rank_candidates(&filter(&[InterestLevel::Hot]), &pool, &[], now());
        let ids: Vec<_> = ranked.iter().map(|c| c.customer.id.as_str()).collect();
        assert_eq!(ids, ["thirty", "ten"]);
        assert!(ranked.iter().all(|c| c.tier == Tier::Recontact));
    }

    #[test]
    fn interest_filter_applies_to_pool() {
        let pool = vec![customer("cold", InterestLevel::Cold)];
        assert!(pick(&filter(&[InterestLevel::Warm, InterestLevel::Hot]), &pool, &[]).is_none());
    }

    #[test]
    fn due_callback_beats_fresh_and_overrides_filter() {
        let cold = called("cold", InterestLevel::Cold, 1);
        let pool = vec![customer("fresh", InterestLevel::Warm)];
        let callbacks = vec![callback(&cold, 2, 1)];
        let best = select_candidate(&filter(&[InterestLevel::Warm]), &pool, &callbacks, now()).unwrap();
        assert_eq!(best.customer.id.as_str(), "cold");
        assert_eq!(best.tier, Tier::Callback);
        assert!(best.callback.is_some());
    }

    #[test]
    fn future_callbacks_are_ignored() {
        let target = customer("later", InterestLevel::Warm);
        let callbacks = vec![callback(&target, 5, -2)];
        assert!(pick(&filter(&[InterestLevel::Hot]), &[], &callbacks).is_none());
    }

    #[test]
    fn urgent_callbacks_first_then_by_priority() {
        let a = called("a", InterestLevel::Warm, 1);
        let b = called("b", InterestLevel::Warm, 1);
        let c = called("c", InterestLevel::Warm, 1);
        let callbacks = vec![callback(&a, 2, 1), callback(&b, 4, 1), callback(&c, 3, 1)];
        let ranked = rank_candidates(&filter(&[InterestLevel::Warm]), &[], &callbacks, now());
        let ids: Vec<_> = ranked.iter().map(|c| c.customer.id.as_str()).collect();
        assert_eq!(ids, ["b", "c", "a"]);
        assert_eq!(ranked[0].tier, Tier::UrgentCallback);
    }

    #[test]
    fn one_candidate_per_customer() {
        let warm = customer("dup", InterestLevel::Warm);
        let callbacks = vec![callback(&warm, 2, 1), callback(&warm, 3, 2)];
        let ranked = rank_candidates(&filter(&[InterestLevel::Warm]), &[warm], &callbacks, now());
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].priority(), 3);
    }

    #[test]
    fn open_sessions_and_converted_are_excluded() {
        let mut busy = customer("busy", InterestLevel::Warm);
        busy.open_session_id = Some(CallSessionId::from("s1"));
        let done = customer("done", InterestLevel::Converted);
        let mut archived = customer("gone", InterestLevel::Warm);
        archived.archived_at = Some(now());
        let callbacks = vec![callback(&busy, 5, 1), callback(&done, 5, 1)];
        let all = [InterestLevel::Warm, InterestLevel::Converted];
        assert!(pick(&filter(&all), &[busy, done, archived], &callbacks).is_none());
    }

    #[test]
    fn customers_on_a_call_are_counted_as_held() {
        let mut busy = customer("busy", InterestLevel::Warm);
        busy.open_session_id = Some(CallSessionId::from("s1"));
        let idle = customer("idle", InterestLevel::Warm);
        let mut off_filter = customer("cold", InterestLevel::Cold);
        off_filter.open_session_id = Some(CallSessionId::from("s2"));
        let f = filter(&[InterestLevel::Warm]);
        assert_eq!(held_by_open_session(&f, &[busy, idle, off_filter], now()), 1);
    }

    #[test]
    fn campaign_callbacks_include_agent_level_ones() {
        let campaign = CampaignId::from("camp");
        let agent = AgentId::from("agent");
        let target = customer("x", InterestLevel::Warm);
        let (mut own, _) = callback(&target, 2, 1);
        own.campaign_id = Some(campaign.clone());
        let (agent_level, _) = callback(&target, 2, 1);
        let (mut other, _) = callback(&target, 2, 1);
        other.campaign_id = Some(CampaignId::from("elsewhere"));
        let (mut foreign, _) = callback(&target, 2, 1);
        foreign.agent_id = AgentId::from("someone-else");

        let kept: Vec<_> =
            callbacks_for_campaign(&campaign, &agent, vec![own.clone(), agent_level.clone(), other, foreign])
                .collect();
        assert_eq!(kept, vec![own, agent_level]);
    }

    #[test]
    fn enrollment_respects_filter_and_cap() {
        let mut dnc = customer("dnc", InterestLevel::Warm);
        dnc.do_not_call = true;
        let customers = vec![
            customer("w1", InterestLevel::Warm),
            customer("w2", InterestLevel::Warm),
            customer("cold", InterestLevel::Cold),
            called("recent", InterestLevel::Hot, 1),
            called("stale", InterestLevel::Hot, 40),
            dnc,
        ];
        let mut f = filter(&[InterestLevel::Warm, InterestLevel::Hot]);
        let enrolled = enroll_pool(&f, &customers, now());
        let ids: Vec<_> = enrolled.iter().map(|id| id.as_str()).collect();
        assert_eq!(ids, ["w1", "w2", "stale"]);

        f.max_customers = 1;
        assert_eq!(enroll_pool(&f, &customers, now()).len(), 1);
    }

    fn level() -> impl Strategy<Value = InterestLevel> {
        prop::sample::select(vec![
            InterestLevel::Cold,
            InterestLevel::Warm,
            InterestLevel::Hot,
            InterestLevel::Converted,
        ])
    }

    proptest! {
        #[test]
        fn do_not_call_customers_are_never_selected(
            specs in prop::collection::vec((level(), any::<bool>(), 0u32..3, 0i64..60, prop::option::of(1u8..=5)), 1..20),
            levels in prop::collection::vec(level(), 1..4),
            max_days in 0u32..30,
        ) {
            let f = CustomerFilter { interest_levels: levels, max_days_since_last_call: max_days, max_customers: 100 };
            let mut pool = Vec::new();
            let mut callbacks = Vec::new();
            for (i, (lvl, dnc, calls, days, cb_priority)) in specs.into_iter().enumerate() {
                let mut c = customer(&format!("c{i}"), lvl);
                c.do_not_call = dnc;
                c.total_calls = calls;
                if calls > 0 {
                    c.last_interaction = Some(now() - Duration::days(days));
                }
                if let Some(priority) = cb_priority {
                    callbacks.push(callback(&c, priority, 1));
                }
                pool.push(c);
            }

            for candidate in rank_candidates(&f, &pool, &callbacks, now()) {
                prop_assert!(!candidate.customer.do_not_call);
                prop_assert!(candidate.customer.interest_level != InterestLevel::Converted);
            }
            for id in enroll_pool(&f, &pool, now()) {
                let c = pool.iter().find(|c| c.id == id).unwrap();
                prop_assert!(!c.do_not_call);
            }
        }
    }
}
