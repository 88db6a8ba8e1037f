// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runner and supervisor tests driven by a manual clock.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use dialflow_core::types::{
    Agent, CallOutcome, CallSession, Campaign, CampaignStatus, CustomerFilter, InterestLevel,
    TimeWindow,
};
use dialflow_scheduler::{CampaignSpec, OutcomeReport};
use dialflow_test_utils::TestHarness;
use tokio_util::sync::CancellationToken;

const DEADLINE: Duration = Duration::from_secs(10);

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
}

async fn setup(customers: usize) -> (TestHarness, Agent, Campaign) {
    let harness = TestHarness::builder().build().await.unwrap();
    let agent = harness.seed_agent(100).await.unwrap();
    for i in 0..customers {
        harness
            .seed_customer(&agent.id, &format!("+1555020{i}"), InterestLevel::Warm)
            .await
            .unwrap();
    }
    let campaign = harness
        .campaigns()
        .create(CampaignSpec {
            name: "runner".into(),
            campaign_type: "new_leads".into(),
            agent_id: agent.id.clone(),
            calls_per_hour: 12,
            window: TimeWindow::parse("09:00", "10:00").unwrap(),
            filter: CustomerFilter {
                interest_levels: vec![InterestLevel::Warm],
                max_days_since_last_call: 7,
                max_customers: 50,
            },
            start_immediately: true,
        })
        .await
        .unwrap();
    (harness, agent, campaign)
}

async fn wait_for_calls(harness: &TestHarness, n: usize) {
    tokio::time::timeout(DEADLINE, async {
        while harness.telephony.call_count().await < n {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("runner did not place the expected calls in time");
}

async fn open_sessions(harness: &TestHarness, agent: &Agent) -> Vec<CallSession> {
    let mut sessions = harness.storage.list_open_sessions(&agent.id).await.unwrap();
    sessions.sort_by_key(|s| s.dispatched_at);
    sessions
}

async fn conclude_all(harness: &TestHarness, agent: &Agent) {
    let learner = harness.learner();
    for session in open_sessions(harness, agent).await {
        learner
            .ingest(OutcomeReport::new(session.id, CallOutcome::Interested))
            .await
            .unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runner_follows_the_rate_and_stops_when_exhausted() {
    let (harness, agent, campaign) = setup(3).await;
    let token = CancellationToken::new();
    let handle = tokio::spawn(harness.runner(&campaign.id).run(token.clone()));

    wait_for_calls(&harness, 3).await;
    let times: Vec<_> = open_sessions(&harness, &agent)
        .await
        .iter()
        .map(|s| s.dispatched_at)
        .collect();
    assert_eq!(times, vec![at(2, 9, 0), at(2, 9, 5), at(2, 9, 10)]);

    conclude_all(&harness, &agent).await;
    tokio::time::timeout(DEADLINE, handle)
        .await
        .expect("runner should exit after completion")
        .unwrap();

    let stored = harness.campaigns().get(&campaign.id).await.unwrap();
    assert_eq!(stored.status, CampaignStatus::Completed);
    assert_eq!(harness.telephony.call_count().await, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pause_stops_runner_and_resume_continues_without_double_dispatch() {
    let (harness, agent, campaign) = setup(5).await;
    let manager = harness.campaigns();

    let handle = tokio::spawn(harness.runner(&campaign.id).run(CancellationToken::new()));
    wait_for_calls(&harness, 2).await;
    manager.pause(&campaign.id).await.unwrap();
    tokio::time::timeout(DEADLINE, handle)
        .await
        .expect("paused campaign should stop its runner")
        .unwrap();
    let placed_while_active = harness.telephony.call_count().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(harness.telephony.call_count().await, placed_while_active);

    manager.resume(&campaign.id).await.unwrap();
    let handle = tokio::spawn(harness.runner(&campaign.id).run(CancellationToken::new()));
    wait_for_calls(&harness, 5).await;
    conclude_all(&harness, &agent).await;
    tokio::time::timeout(DEADLINE, handle)
        .await
        .expect("runner should exit after completion")
        .unwrap();

    let requests = harness.telephony.requests().await;
    assert_eq!(requests.len(), 5);
    let customers: HashSet<_> = requests.iter().map(|r| r.customer_id.clone()).collect();
    assert_eq!(customers.len(), 5);

    let mut slots = HashSet::new();
    for request in &requests {
        let session = harness
            .storage
            .get_call_session(&request.session_id)
            .await
            .unwrap()
            .unwrap();
        let minute = session.dispatched_at.timestamp() / 60;
        assert!(slots.insert(minute / 5), "two dispatches in one slot");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_ends_runner() {
    let (harness, _agent, campaign) = setup(10).await;
    let token = CancellationToken::new();
    let handle = tokio::spawn(harness.runner(&campaign.id).run(token.clone()));

    wait_for_calls(&harness, 1).await;
    token.cancel();
    tokio::time::timeout(DEADLINE, handle)
        .await
        .expect("cancelled runner should exit")
        .unwrap();

    let stored = harness.campaigns().get(&campaign.id).await.unwrap();
    assert_eq!(stored.status, CampaignStatus::Active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn supervisor_runs_active_campaigns_and_drains_on_shutdown() {
    let (harness, agent, _campaign) = setup(4).await;
    harness
        .campaigns()
        .create(CampaignSpec {
            name: "draft".into(),
            campaign_type: "new_leads".into(),
            agent_id: agent.id.clone(),
            calls_per_hour: 12,
            window: TimeWindow::parse("09:00", "10:00").unwrap(),
            filter: CustomerFilter {
                interest_levels: vec![InterestLevel::Warm],
                max_days_since_last_call: 7,
                max_customers: 50,
            },
            start_immediately: false,
        })
        .await
        .unwrap();

    let token = CancellationToken::new();
    let mut supervisor = harness.supervisor();
    assert_eq!(supervisor.reconcile(&token).await.unwrap(), 1);
    assert_eq!(supervisor.reconcile(&token).await.unwrap(), 1, "no duplicate runners");

    wait_for_calls(&harness, 1).await;
    token.cancel();
    tokio::time::timeout(DEADLINE, supervisor.shutdown())
        .await
        .expect("shutdown should drain runners");
    assert_eq!(supervisor.running(), 0);

    let token = CancellationToken::new();
    let run = tokio::spawn(harness.supervisor().run(token.clone()));
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();
    tokio::time::timeout(DEADLINE, run)
        .await
        .expect("supervisor should stop")
        .unwrap()
        .unwrap();
}
