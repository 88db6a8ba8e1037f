// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end scheduler tests.
//!
//! `TestHarness` assembles a temp SQLite database, a [`MockTelephony`], a
//! [`ManualClock`], and the scheduler components wired to them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use dialflow_config::model::{CampaignDefaultsConfig, SchedulerConfig, StorageConfig};
use dialflow_core::types::{Agent, AgentId, CampaignId, Customer, CustomerFilter, InterestLevel};
use dialflow_core::{Clock, DialflowError, StorageAdapter, TelephonyAdapter};
use dialflow_scheduler::campaign::default_filter;
use dialflow_scheduler::{CampaignManager, CampaignRunner, Dispatcher, Learner, Scheduler};
use dialflow_storage::SqliteStorage;

use crate::clock::ManualClock;
use crate::mock_telephony::MockTelephony;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    start: DateTime<Utc>,
    responses: Vec<Result<String, String>>,
    telephony_delay: Option<Duration>,
    dispatch_timeout: Duration,
    scheduler: SchedulerConfig,
    immediate_filter: CustomerFilter,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            // A Monday, before a 09:00 window opens.
            start: Utc
                .with_ymd_and_hms(2026, 3, 2, 8, 0, 0)
                .single()
                .unwrap_or_default(),
            responses: Vec::new(),
            telephony_delay: None,
            dispatch_timeout: Duration::from_secs(5),
            scheduler: SchedulerConfig::default(),
            immediate_filter: default_filter(&CampaignDefaultsConfig::default()),
        }
    }

    /// Initial time of the manual clock.
    pub fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Scripted telephony results, consumed in order.
    pub fn with_telephony_responses(mut self, responses: Vec<Result<String, String>>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_telephony_delay(mut self, delay: Duration) -> Self {
        self.telephony_delay = Some(delay);
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn with_scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler = config;
        self
    }

    pub fn with_immediate_filter(mut self, filter: CustomerFilter) -> Self {
        self.immediate_filter = filter;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, DialflowError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| DialflowError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        });
        storage.initialize().await?;
        let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

        let mut telephony = MockTelephony::with_responses(self.responses);
        if let Some(delay) = self.telephony_delay {
            telephony = telephony.with_delay(delay);
        }
        let telephony = Arc::new(telephony);
        let clock = Arc::new(ManualClock::new(self.start));

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&storage),
            Arc::clone(&telephony) as Arc<dyn TelephonyAdapter>,
            self.dispatch_timeout,
            self.immediate_filter,
        )
        .with_utc_offset(self.scheduler.utc_offset_minutes)?);

        Ok(TestHarness {
            storage,
            telephony,
            clock,
            dispatcher,
            scheduler: self.scheduler,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete scheduler stack over a throwaway database.
pub struct TestHarness {
    pub storage: Arc<dyn StorageAdapter>,
    pub telephony: Arc<MockTelephony>,
    pub clock: Arc<ManualClock>,
    pub dispatcher: Arc<Dispatcher>,
    pub scheduler: SchedulerConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    fn dyn_clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock) as Arc<dyn Clock>
    }

    pub fn campaigns(&self) -> CampaignManager {
        CampaignManager::new(Arc::clone(&self.storage), self.dyn_clock())
    }

    pub fn learner(&self) -> Learner {
        Learner::new(Arc::clone(&self.storage), self.dyn_clock(), &self.scheduler)
    }

    pub fn runner(&self, campaign_id: &CampaignId) -> CampaignRunner {
        CampaignRunner::new(
            campaign_id.clone(),
            Arc::clone(&self.storage),
            self.dyn_clock(),
            Arc::clone(&self.dispatcher),
            &self.scheduler,
        )
    }

    pub fn supervisor(&self) -> Scheduler {
        Scheduler::new(
            Arc::clone(&self.storage),
            self.dyn_clock(),
            Arc::clone(&self.dispatcher),
            self.scheduler.clone(),
        )
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Insert an agent allowed `max_daily_calls` per day.
    pub async fn seed_agent(&self, max_daily_calls: u32) -> Result<Agent, DialflowError> {
        let agent = Agent::new("Test Agent", max_daily_calls, self.now());
        self.storage.create_agent(&agent).await?;
        Ok(agent)
    }

    pub async fn seed_customer(
        &self,
        agent_id: &AgentId,
        phone: &str,
        level: InterestLevel,
    ) -> Result<Customer, DialflowError> {
        let customer = Customer::new(agent_id.clone(), phone, format!("Customer {phone}"), self.now())
            .with_interest(level);
        self.storage.upsert_customer(&customer).await
    }
}
