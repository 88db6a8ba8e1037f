// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end dispatch and outcome scenarios over a real SQLite database.
//!
//! Time is passed explicitly to the ticker and dispatcher, so these tests are
//! deterministic and never sleep.

use chrono::{DateTime, Duration, TimeZone, Utc};
use dialflow_config::model::SchedulerConfig;
use dialflow_core::DialflowError;
use dialflow_core::types::{
    Agent, AgentStatus, CallOutcome, CallType, Campaign, CampaignStatus, CustomerFilter,
    InterestLevel, TimeWindow,
};
use dialflow_scheduler::{
    CampaignEdit, CampaignSpec, ImmediateTarget, IngestResult, OutcomeReport, Permit, SkipReason,
    TickOutcome, Ticker,
};
use dialflow_test_utils::TestHarness;

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
}

fn warm_filter() -> CustomerFilter {
    CustomerFilter {
        interest_levels: vec![InterestLevel::Warm],
        max_days_since_last_call: 7,
        max_customers: 50,
    }
}

async fn launch_campaign(
    harness: &TestHarness,
    agent: &Agent,
    calls_per_hour: u32,
    filter: CustomerFilter,
) -> Campaign {
    harness
        .campaigns()
        .create(CampaignSpec {
            name: "spring outreach".into(),
            campaign_type: "new_leads".into(),
            agent_id: agent.id.clone(),
            calls_per_hour,
            window: TimeWindow::parse("09:00", "10:00").unwrap(),
            filter,
            start_immediately: true,
        })
        .await
        .unwrap()
}

fn dispatched(outcome: &TickOutcome) -> &dialflow_scheduler::DispatchRecord {
    match outcome {
        TickOutcome::Dispatched(record) => record,
        other => panic!("expected a dispatch, got {other:?}"),
    }
}

#[tokio::test]
async fn twelve_per_hour_dispatches_every_five_minutes_then_completes() {
    let harness = TestHarness::builder().build().await.unwrap();
    let agent = harness.seed_agent(100).await.unwrap();
    for phone in ["+15550001", "+15550002", "+15550003"] {
        harness
            .seed_customer(&agent.id, phone, InterestLevel::Warm)
            .await
            .unwrap();
    }
    let campaign = launch_campaign(&harness, &agent, 12, warm_filter()).await;
    assert_eq!(campaign.status, CampaignStatus::Active);

    let mut ticker = Ticker::new(12, campaign.window, 0).unwrap();
    let mut dispatch_times = Vec::new();
    let mut sessions = Vec::new();
    let mut now = at(2, 8, 55);
    while now < at(2, 9, 30) {
        harness.clock.set(now);
        if let Permit::Ready(slot) = ticker.poll(now) {
            ticker.claim(slot);
            let outcome = harness.dispatcher.tick(&campaign.id, now).await.unwrap();
            if let TickOutcome::Dispatched(record) = outcome {
                dispatch_times.push(now);
                sessions.push(record.session_id);
            } else {
                assert_eq!(outcome, TickOutcome::Skipped(SkipReason::NoCandidate));
            }
        }
        now += Duration::minutes(1);
    }
    assert_eq!(dispatch_times, vec![at(2, 9, 0), at(2, 9, 5), at(2, 9, 10)]);

    let learner = harness.learner();
    for (i, session) in sessions.iter().enumerate() {
        let outcome = harness.dispatcher.tick(&campaign.id, at(2, 9, 35)).await.unwrap();
        assert_eq!(outcome, TickOutcome::Skipped(SkipReason::NoCandidate), "after {i} outcomes");
        learner
            .ingest(OutcomeReport::new(session.clone(), CallOutcome::Interested))
            .await
            .unwrap();
    }

    let outcome = harness.dispatcher.tick(&campaign.id, at(2, 9, 40)).await.unwrap();
    assert_eq!(outcome, TickOutcome::Completed);

    let stats = harness.campaigns().stats(&campaign.id).await.unwrap();
    assert_eq!(stats.campaign.status, CampaignStatus::Completed);
    assert_eq!(stats.campaign.calls_completed, 3);
    assert_eq!(stats.campaign.successful_calls, 3);
    assert_eq!(stats.open_sessions, 0);
    assert!((stats.success_rate - 100.0).abs() < 1e-9);

    let after = harness.dispatcher.tick(&campaign.id, at(2, 9, 45)).await.unwrap();
    assert_eq!(after, TickOutcome::Inactive);
}

#[tokio::test]
async fn callback_outranks_fresh_customers_once_due() {
    let harness = TestHarness::builder().with_start(at(2, 9, 0)).build().await.unwrap();
    let agent = harness.seed_agent(100).await.unwrap();
    let asker = harness
        .seed_customer(&agent.id, "+15550010", InterestLevel::Warm)
        .await
        .unwrap();
    for phone in ["+15550011", "+15550012"] {
        harness
            .seed_customer(&agent.id, phone, InterestLevel::Warm)
            .await
            .unwrap();
    }

    let first = harness
        .dispatcher
        .dispatch_immediate(
            &agent.id,
            ImmediateTarget::Phones(vec![asker.phone_number.clone()]),
            at(2, 9, 0),
        )
        .await
        .unwrap();
    let session = dispatched(&first[0]).session_id.clone();
    assert_eq!(dispatched(&first[0]).call_type, CallType::Immediate);

    let mut report = OutcomeReport::new(session, CallOutcome::CallbackRequested);
    report.callback_at = Some(at(4, 9, 0));
    let result = harness.learner().ingest(report).await.unwrap();
    let IngestResult::Applied { after, callback_id, .. } = result else {
        panic!("outcome should apply");
    };
    assert_eq!(after, InterestLevel::Hot);
    let callback_id = callback_id.expect("callback created");

    let pending = harness.storage.list_pending_callbacks(&agent.id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, callback_id);
    assert!(matches!(pending[0].priority, 2 | 3));
    assert_eq!(pending[0].reason, "customer requested callback");

    let customer = harness.storage.get_customer(&asker.id).await.unwrap().unwrap();
    assert_eq!(customer.next_followup, Some(at(4, 9, 0)));

    // The asker is now hot, outside this campaign's warm-only filter.
    let campaign = launch_campaign(&harness, &agent, 12, warm_filter()).await;

    let before_due = harness.dispatcher.tick(&campaign.id, at(3, 9, 0)).await.unwrap();
    assert_ne!(dispatched(&before_due).customer_id, asker.id);

    let due = harness.dispatcher.tick(&campaign.id, at(4, 9, 5)).await.unwrap();
    let record = dispatched(&due);
    assert_eq!(record.customer_id, asker.id);
    assert_eq!(record.call_type, CallType::Followup);
    assert!(harness.storage.list_pending_callbacks(&agent.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn stopped_campaign_hands_its_callbacks_to_the_agent() {
    let harness = TestHarness::builder().build().await.unwrap();
    let agent = harness.seed_agent(100).await.unwrap();
    let asker = harness
        .seed_customer(&agent.id, "+15550015", InterestLevel::Warm)
        .await
        .unwrap();
    let original = launch_campaign(&harness, &agent, 12, warm_filter()).await;

    let tick = harness.dispatcher.tick(&original.id, at(2, 9, 0)).await.unwrap();
    let session = dispatched(&tick).session_id.clone();
    let mut report = OutcomeReport::new(session, CallOutcome::CallbackRequested);
    report.callback_at = Some(at(4, 9, 0));
    harness.learner().ingest(report).await.unwrap();
    let pending = harness.storage.list_pending_callbacks(&agent.id).await.unwrap();
    assert_eq!(pending[0].campaign_id, Some(original.id.clone()));

    let stopped = harness.campaigns().stop(&original.id).await.unwrap();
    assert_eq!(stopped.status, CampaignStatus::Cancelled);
    let pending = harness.storage.list_pending_callbacks(&agent.id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].campaign_id.is_none());

    // The asker is hot now, so only the callback can bring them into this campaign.
    let successor = launch_campaign(&harness, &agent, 12, warm_filter()).await;
    let due = harness.dispatcher.tick(&successor.id, at(4, 9, 5)).await.unwrap();
    let record = dispatched(&due);
    assert_eq!(record.customer_id, asker.id);
    assert_eq!(record.call_type, CallType::Followup);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ticks_open_one_session() {
    let harness = TestHarness::builder().build().await.unwrap();
    let agent = harness.seed_agent(100).await.unwrap();
    harness
        .seed_customer(&agent.id, "+15550020", InterestLevel::Warm)
        .await
        .unwrap();
    let first = launch_campaign(&harness, &agent, 60, warm_filter()).await;
    let second = launch_campaign(&harness, &agent, 60, warm_filter()).await;

    let now = at(2, 9, 0);
    let (a, b, c) = tokio::join!(
        harness.dispatcher.tick(&first.id, now),
        harness.dispatcher.tick(&first.id, now),
        harness.dispatcher.tick(&second.id, now),
    );
    let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];
    let placed = outcomes
        .iter()
        .filter(|o| matches!(o, TickOutcome::Dispatched(_)))
        .count();
    assert_eq!(placed, 1, "{outcomes:?}");
    for outcome in &outcomes {
        assert!(matches!(
            outcome,
            TickOutcome::Dispatched(_)
                | TickOutcome::Skipped(SkipReason::GuardRejected | SkipReason::NoCandidate)
        ));
    }
    assert_eq!(harness.telephony.call_count().await, 1);
    assert_eq!(harness.storage.list_open_sessions(&agent.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn duplicate_outcome_is_a_no_op() {
    let harness = TestHarness::builder().build().await.unwrap();
    let agent = harness.seed_agent(100).await.unwrap();
    let customer = harness
        .seed_customer(&agent.id, "+15550030", InterestLevel::Warm)
        .await
        .unwrap();
    let campaign = launch_campaign(&harness, &agent, 12, warm_filter()).await;
    let tick = harness.dispatcher.tick(&campaign.id, at(2, 9, 0)).await.unwrap();
    let session = dispatched(&tick).session_id.clone();

    let mut report = OutcomeReport::new(session.clone(), CallOutcome::Converted);
    report.satisfaction = Some(4);
    let learner = harness.learner();
    assert!(matches!(
        learner.ingest(report.clone()).await.unwrap(),
        IngestResult::Applied { after: InterestLevel::Converted, .. }
    ));
    let agent_once = harness.storage.get_agent(&agent.id).await.unwrap().unwrap();
    let customer_once = harness.storage.get_customer(&customer.id).await.unwrap().unwrap();
    let campaign_once = harness.storage.get_campaign(&campaign.id).await.unwrap().unwrap();

    assert_eq!(learner.ingest(report).await.unwrap(), IngestResult::AlreadyConcluded);
    assert_eq!(harness.storage.get_agent(&agent.id).await.unwrap().unwrap(), agent_once);
    assert_eq!(harness.storage.get_customer(&customer.id).await.unwrap().unwrap(), customer_once);
    assert_eq!(harness.storage.get_campaign(&campaign.id).await.unwrap().unwrap(), campaign_once);

    assert_eq!(agent_once.calls_handled, 1);
    assert_eq!(agent_once.conversions, 1);
    assert_eq!(agent_once.average_satisfaction(), Some(4.0));
    assert_eq!(customer_once.total_calls, 1);
    assert!(customer_once.open_session_id.is_none());
    assert_eq!(campaign_once.conversions, 1);
}

#[tokio::test]
async fn outcome_validation_errors() {
    let harness = TestHarness::builder().build().await.unwrap();
    let learner = harness.learner();

    let err = learner
        .ingest(OutcomeReport::new("missing".into(), CallOutcome::Busy))
        .await
        .unwrap_err();
    assert!(matches!(err, DialflowError::NotFound { .. }));

    for score in [0, 6, 10] {
        let mut report = OutcomeReport::new("missing".into(), CallOutcome::Busy);
        report.satisfaction = Some(score);
        assert!(matches!(
            learner.ingest(report).await.unwrap_err(),
            DialflowError::InvalidInput(_)
        ));
    }

    let mut report = OutcomeReport::new("missing".into(), CallOutcome::Busy);
    report.satisfaction = Some(5);
    assert!(matches!(
        learner.ingest(report).await.unwrap_err(),
        DialflowError::NotFound { .. }
    ));
}

#[tokio::test]
async fn telephony_failure_releases_customer_without_counting() {
    let harness = TestHarness::builder()
        .with_telephony_responses(vec![Err("carrier unavailable".into())])
        .build()
        .await
        .unwrap();
    let agent = harness.seed_agent(100).await.unwrap();
    let customer = harness
        .seed_customer(&agent.id, "+15550040", InterestLevel::Warm)
        .await
        .unwrap();
    let campaign = launch_campaign(&harness, &agent, 12, warm_filter()).await;

    let failed = harness.dispatcher.tick(&campaign.id, at(2, 9, 0)).await.unwrap();
    let TickOutcome::DispatchFailed { session_id, reason } = failed else {
        panic!("expected failure, got {failed:?}");
    };
    assert!(reason.contains("carrier unavailable"));

    let session = harness.storage.get_call_session(&session_id).await.unwrap().unwrap();
    assert_eq!(session.outcome, Some(CallOutcome::NoAnswer));
    assert!(session.failure_reason.is_some());

    let stored = harness.storage.get_customer(&customer.id).await.unwrap().unwrap();
    assert_eq!(stored.total_calls, 0);
    assert_eq!(stored.interest_level, InterestLevel::Warm);
    assert!(stored.open_session_id.is_none());

    let retry = harness.dispatcher.tick(&campaign.id, at(2, 9, 5)).await.unwrap();
    assert_eq!(dispatched(&retry).customer_id, customer.id);
}

#[tokio::test]
async fn slow_provider_times_out() {
    let harness = TestHarness::builder()
        .with_telephony_delay(std::time::Duration::from_millis(500))
        .with_dispatch_timeout(std::time::Duration::from_millis(20))
        .build()
        .await
        .unwrap();
    let agent = harness.seed_agent(100).await.unwrap();
    harness
        .seed_customer(&agent.id, "+15550050", InterestLevel::Warm)
        .await
        .unwrap();
    let campaign = launch_campaign(&harness, &agent, 12, warm_filter()).await;

    let outcome = harness.dispatcher.tick(&campaign.id, at(2, 9, 0)).await.unwrap();
    let TickOutcome::DispatchFailed { reason, .. } = outcome else {
        panic!("expected timeout failure, got {outcome:?}");
    };
    assert!(reason.contains("timed out"));
    assert!(harness.storage.list_open_sessions(&agent.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn daily_cap_and_paused_agent_block_dispatch() {
    let harness = TestHarness::builder().build().await.unwrap();
    let agent = harness.seed_agent(1).await.unwrap();
    for phone in ["+15550060", "+15550061"] {
        harness
            .seed_customer(&agent.id, phone, InterestLevel::Warm)
            .await
            .unwrap();
    }
    let campaign = launch_campaign(&harness, &agent, 12, warm_filter()).await;

    let first = harness.dispatcher.tick(&campaign.id, at(2, 9, 0)).await.unwrap();
    dispatched(&first);
    let capped = harness.dispatcher.tick(&campaign.id, at(2, 9, 5)).await.unwrap();
    assert_eq!(capped, TickOutcome::Skipped(SkipReason::DailyCapReached));

    let next_day = harness.dispatcher.tick(&campaign.id, at(3, 9, 0)).await.unwrap();
    dispatched(&next_day);

    harness
        .storage
        .set_agent_status(&agent.id, AgentStatus::Paused)
        .await
        .unwrap();
    let paused = harness.dispatcher.tick(&campaign.id, at(4, 9, 0)).await.unwrap();
    assert_eq!(paused, TickOutcome::Skipped(SkipReason::AgentPaused));
}

#[tokio::test]
async fn daily_cap_resets_at_local_midnight() {
    let harness = TestHarness::builder()
        .with_scheduler_config(SchedulerConfig {
            utc_offset_minutes: -5 * 60,
            ..SchedulerConfig::default()
        })
        .build()
        .await
        .unwrap();
    let agent = harness.seed_agent(1).await.unwrap();
    for phone in ["+15550070", "+15550071", "+15550072"] {
        harness
            .seed_customer(&agent.id, phone, InterestLevel::Warm)
            .await
            .unwrap();
    }
    let campaign = launch_campaign(&harness, &agent, 12, warm_filter()).await;

    // 18:30 and 19:30 at -05:00 fall on one local day but straddle UTC midnight.
    let evening = harness.dispatcher.tick(&campaign.id, at(2, 23, 30)).await.unwrap();
    dispatched(&evening);
    let after_utc_midnight = harness.dispatcher.tick(&campaign.id, at(3, 0, 30)).await.unwrap();
    assert_eq!(after_utc_midnight, TickOutcome::Skipped(SkipReason::DailyCapReached));

    let next_local_day = harness.dispatcher.tick(&campaign.id, at(3, 23, 30)).await.unwrap();
    dispatched(&next_local_day);
}

#[tokio::test]
async fn immediate_calls_by_phone_and_by_rank() {
    let harness = TestHarness::builder().build().await.unwrap();
    let agent = harness.seed_agent(100).await.unwrap();
    let blocked = harness
        .seed_customer(&agent.id, "+15550070", InterestLevel::Warm)
        .await
        .unwrap();
    harness.storage.set_do_not_call(&blocked.id, true).await.unwrap();
    harness
        .seed_customer(&agent.id, "+15550071", InterestLevel::Hot)
        .await
        .unwrap();
    harness
        .seed_customer(&agent.id, "+15550072", InterestLevel::Cold)
        .await
        .unwrap();

    let outcomes = harness
        .dispatcher
        .dispatch_immediate(
            &agent.id,
            ImmediateTarget::Phones(vec!["+15550099".into(), blocked.phone_number.clone()]),
            at(2, 11, 0),
        )
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(dispatched(&outcomes[0]).call_type, CallType::Immediate);
    assert_eq!(outcomes[1], TickOutcome::Skipped(SkipReason::NotCallable));
    let added = harness
        .storage
        .find_customer_by_phone(&agent.id, "+15550099")
        .await
        .unwrap()
        .expect("unknown number added to the directory");
    assert!(added.has_open_session());

    // Default immediate filter is warm + hot: the new warm customer is busy,
    // the blocked one is excluded, the cold one does not match.
    let ranked = harness
        .dispatcher
        .dispatch_immediate(&agent.id, ImmediateTarget::Next(5), at(2, 11, 5))
        .await
        .unwrap();
    assert_eq!(ranked.len(), 1);
    let record = dispatched(&ranked[0]);
    let hot = harness.storage.get_customer(&record.customer_id).await.unwrap().unwrap();
    assert_eq!(hot.phone_number, "+15550071");
}

#[tokio::test]
async fn connect_time_drives_duration() {
    let harness = TestHarness::builder().with_start(at(2, 9, 0)).build().await.unwrap();
    let agent = harness.seed_agent(100).await.unwrap();
    harness
        .seed_customer(&agent.id, "+15550080", InterestLevel::Cold)
        .await
        .unwrap();
    let outcomes = harness
        .dispatcher
        .dispatch_immediate(&agent.id, ImmediateTarget::Phones(vec!["+15550080".into()]), at(2, 9, 0))
        .await
        .unwrap();
    let session = dispatched(&outcomes[0]).session_id.clone();

    let learner = harness.learner();
    assert!(learner.record_connected(&session, at(2, 9, 1)).await.unwrap());
    assert!(!learner.record_connected(&session, at(2, 9, 2)).await.unwrap());

    harness.clock.set(at(2, 9, 4));
    let mut report = OutcomeReport::new(session.clone(), CallOutcome::NotInterested);
    report.notes = Some("asked to be removed next time".into());
    report.objections = vec![("too expensive".into(), "offered the starter plan".into())];
    learner.ingest(report).await.unwrap();

    let stored = harness.storage.get_call_session(&session).await.unwrap().unwrap();
    assert_eq!(stored.connected_at, Some(at(2, 9, 1)));
    assert_eq!(stored.ended_at, Some(at(2, 9, 4)));
    assert_eq!(stored.duration_seconds, 180);

    let customer = harness
        .storage
        .find_customer_by_phone(&agent.id, "+15550080")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(customer.interest_level, InterestLevel::Cold);
    assert_eq!(customer.objections.len(), 1);
    assert_eq!(customer.notes.len(), 1);
    assert_eq!(customer.last_interaction, Some(at(2, 9, 4)));
}

#[tokio::test]
async fn campaign_lifecycle_and_edits() {
    let harness = TestHarness::builder().build().await.unwrap();
    let agent = harness.seed_agent(100).await.unwrap();
    harness
        .seed_customer(&agent.id, "+15550090", InterestLevel::Warm)
        .await
        .unwrap();
    harness
        .seed_customer(&agent.id, "+15550091", InterestLevel::Cold)
        .await
        .unwrap();

    let manager = harness.campaigns();
    let campaign = manager
        .create(CampaignSpec {
            name: "q2".into(),
            campaign_type: "new_leads".into(),
            agent_id: agent.id.clone(),
            calls_per_hour: 6,
            window: TimeWindow::parse("09:00", "12:00").unwrap(),
            filter: warm_filter(),
            start_immediately: false,
        })
        .await
        .unwrap();
    assert_eq!(campaign.status, CampaignStatus::Draft);
    assert_eq!(manager.stats(&campaign.id).await.unwrap().pool_size, 1);

    let edited = manager
        .edit(
            &campaign.id,
            CampaignEdit {
                calls_per_hour: Some(20),
                campaign_type: Some("renewals".into()),
                ..CampaignEdit::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.calls_per_hour, 20);
    let stored = manager.get(&campaign.id).await.unwrap();
    assert_eq!(stored.campaign_type, "renewals");

    manager.launch(&campaign.id).await.unwrap();
    let err = manager
        .edit(&campaign.id, CampaignEdit { calls_per_hour: Some(5), ..CampaignEdit::default() })
        .await
        .unwrap_err();
    assert!(matches!(err, DialflowError::InvalidTransition { .. }));

    manager.pause(&campaign.id).await.unwrap();
    let bad = CampaignEdit {
        window: Some(TimeWindow::parse("12:00", "09:00").unwrap()),
        ..CampaignEdit::default()
    };
    assert!(matches!(
        manager.edit(&campaign.id, bad).await.unwrap_err(),
        DialflowError::InvalidCampaign(_)
    ));

    let widened = CampaignEdit {
        filter: Some(CustomerFilter {
            interest_levels: vec![InterestLevel::Cold, InterestLevel::Warm],
            ..warm_filter()
        }),
        ..CampaignEdit::default()
    };
    manager.edit(&campaign.id, widened).await.unwrap();
    assert_eq!(manager.stats(&campaign.id).await.unwrap().pool_size, 2);

    let resumed = manager.resume(&campaign.id).await.unwrap();
    assert_eq!(resumed.status, CampaignStatus::Active);
    let stopped = manager.stop(&campaign.id).await.unwrap();
    assert_eq!(stopped.status, CampaignStatus::Cancelled);
    assert!(manager.resume(&campaign.id).await.is_err());
    assert!(manager.stop(&campaign.id).await.is_err());

    let cancelled = manager.list(Some(CampaignStatus::Cancelled)).await.unwrap();
    assert_eq!(cancelled.len(), 1);
}

#[tokio::test]
async fn campaign_for_unknown_agent_is_rejected() {
    let harness = TestHarness::builder().build().await.unwrap();
    let err = harness
        .campaigns()
        .create(CampaignSpec {
            name: "ghost".into(),
            campaign_type: "new_leads".into(),
            agent_id: "nobody".into(),
            calls_per_hour: 10,
            window: TimeWindow::parse("09:00", "17:00").unwrap(),
            filter: warm_filter(),
            start_immediately: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DialflowError::NotFound { entity: "agent", .. }));
}
