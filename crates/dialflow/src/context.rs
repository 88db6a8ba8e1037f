// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage, telephony, and scheduler components assembled from config.

use std::sync::Arc;
use std::time::Duration;

use dialflow_config::model::DialflowConfig;
use dialflow_core::{Clock, DialflowError, StorageAdapter, SystemClock};
use dialflow_scheduler::campaign::default_filter;
use dialflow_scheduler::{CampaignManager, Dispatcher, Learner};
use dialflow_storage::SqliteStorage;
use dialflow_telephony::build_telephony;

/// Everything a command needs, built once per invocation.
pub struct AppContext {
    pub config: DialflowConfig,
    pub storage: Arc<dyn StorageAdapter>,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    /// Open (and migrate) the configured database.
    pub async fn open(config: DialflowConfig) -> Result<Self, DialflowError> {
        let storage = SqliteStorage::new(config.storage.clone());
        storage.initialize().await?;
        Ok(Self {
            config,
            storage: Arc::new(storage),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn campaigns(&self) -> CampaignManager {
        CampaignManager::new(Arc::clone(&self.storage), Arc::clone(&self.clock))
    }

    pub fn learner(&self) -> Learner {
        Learner::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.clock),
            &self.config.scheduler,
        )
    }

    /// A dispatcher wired to the configured telephony adapter.
    pub fn dispatcher(&self) -> Result<Dispatcher, DialflowError> {
        let telephony = build_telephony(&self.config.telephony)?;
        Dispatcher::new(
            Arc::clone(&self.storage),
            telephony,
            Duration::from_secs(self.config.telephony.timeout_secs),
            default_filter(&self.config.campaign_defaults),
        )
        .with_utc_offset(self.config.scheduler.utc_offset_minutes)
    }

    pub async fn close(self) -> Result<(), DialflowError> {
        self.storage.close().await
    }
}
