// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background tasks: one runner per active campaign plus a supervisor that
//! starts and stops runners.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dialflow_config::model::SchedulerConfig;
use dialflow_core::types::{CampaignId, CampaignStatus, TimeWindow};
use dialflow_core::{Clock, DialflowError, StorageAdapter};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{Dispatcher, TickOutcome};
use crate::ticker::{Permit, Ticker};

/// Drives the ticker and dispatcher for one campaign until it stops being
/// active or the token is cancelled.
///
/// Campaign status is re-read before every permit, so pause and stop take
/// effect at the next tick boundary. Errors are logged and retried after a
/// wait; they never end the loop.
pub struct CampaignRunner {
    campaign_id: CampaignId,
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<Dispatcher>,
    max_wait: Duration,
    utc_offset_minutes: i32,
}

impl CampaignRunner {
    pub fn new(
        campaign_id: CampaignId,
        storage: Arc<dyn StorageAdapter>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<Dispatcher>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            campaign_id,
            storage,
            clock,
            dispatcher,
            max_wait: Duration::from_secs(config.max_wait_secs.max(1)),
            utc_offset_minutes: config.utc_offset_minutes,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let id = self.campaign_id.clone();
        info!(campaign_id = %id, "campaign runner started");

        // Rebuilt whenever rate or window differ from what it was built for.
        let mut ticker: Option<(u32, TimeWindow, Ticker)> = None;
        let mut stalled_logged = false;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let campaign = match self.storage.get_campaign(&id).await {
                Ok(Some(campaign)) => campaign,
                Ok(None) => {
                    warn!(campaign_id = %id, "campaign disappeared, stopping runner");
                    break;
                }
                Err(e) => {
                    error!(campaign_id = %id, error = %e, "failed to load campaign");
                    if !self.wait(self.max_wait, &cancel).await {
                        break;
                    }
                    continue;
                }
            };
            if campaign.status != CampaignStatus::Active {
                info!(campaign_id = %id, status = %campaign.status, "campaign not active, runner exiting");
                break;
            }

            let stale = ticker.as_ref().is_none_or(|(rate, window, _)| {
                *rate != campaign.calls_per_hour || *window != campaign.window
            });
            if stale {
                match self.build_ticker(campaign.calls_per_hour, campaign.window).await {
                    Ok(built) => ticker = Some((campaign.calls_per_hour, campaign.window, built)),
                    Err(e) => {
                        error!(campaign_id = %id, error = %e, "cannot schedule campaign");
                        if !self.wait(self.max_wait, &cancel).await {
                            break;
                        }
                        continue;
                    }
                }
            }
            let Some((_, _, ticker)) = ticker.as_mut() else {
                continue;
            };

            match ticker.poll(self.clock.now()) {
                Permit::Ready(slot) => {
                    ticker.claim(slot);
                    match self.dispatcher.tick(&id, self.clock.now()).await {
                        Ok(TickOutcome::Completed) | Ok(TickOutcome::Inactive) => break,
                        Ok(outcome) => debug!(campaign_id = %id, ?outcome, "tick handled"),
                        Err(e) => warn!(campaign_id = %id, error = %e, "tick failed"),
                    }
                }
                Permit::Wait(duration) => {
                    if !self.wait(duration.min(self.max_wait), &cancel).await {
                        break;
                    }
                }
                Permit::Stalled => {
                    if !stalled_logged {
                        warn!(campaign_id = %id, "campaign window never opens, runner stalled");
                        stalled_logged = true;
                    }
                    if !self.wait(self.max_wait, &cancel).await {
                        break;
                    }
                }
            }
        }

        info!(campaign_id = %id, "campaign runner stopped");
    }

    async fn build_ticker(&self, rate: u32, window: TimeWindow) -> Result<Ticker, DialflowError> {
        let mut ticker = Ticker::new(rate, window, self.utc_offset_minutes)?;
        if let Some(last) = self.storage.last_campaign_dispatch(&self.campaign_id).await? {
            ticker.resume_from(last);
        }
        Ok(ticker)
    }

    /// Returns `false` if cancelled while waiting.
    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = self.clock.sleep(duration) => true,
        }
    }
}

/// Keeps one [`CampaignRunner`] alive per active campaign.
pub struct Scheduler {
    storage: Arc<dyn StorageAdapter>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<Dispatcher>,
    config: SchedulerConfig,
    runners: HashMap<CampaignId, JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(
        storage: Arc<dyn StorageAdapter>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<Dispatcher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            storage,
            clock,
            dispatcher,
            config,
            runners: HashMap::new(),
        }
    }

    /// Reconcile runners every `poll_interval_secs` until cancelled, then
    /// drain them.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), DialflowError> {
        let poll = Duration::from_secs(self.config.poll_interval_secs.max(1));
        info!(poll_secs = poll.as_secs(), "scheduler started");

        loop {
            if let Err(e) = self.reconcile(&cancel).await {
                error!(error = %e, "failed to reconcile campaign runners");
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(poll) => {}
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Start runners for active campaigns that have none and forget runners
    /// that have exited. Returns the number of live runners.
    pub async fn reconcile(&mut self, cancel: &CancellationToken) -> Result<usize, DialflowError> {
        self.runners.retain(|_, handle| !handle.is_finished());

        let active = self.storage.list_campaigns(Some(CampaignStatus::Active)).await?;
        for campaign in active {
            if self.runners.contains_key(&campaign.id) {
                continue;
            }
            let runner = CampaignRunner::new(
                campaign.id.clone(),
                Arc::clone(&self.storage),
                Arc::clone(&self.clock),
                Arc::clone(&self.dispatcher),
                &self.config,
            );
            let handle = tokio::spawn(runner.run(cancel.child_token()));
            debug!(campaign_id = %campaign.id, "spawned campaign runner");
            self.runners.insert(campaign.id, handle);
        }
        Ok(self.runners.len())
    }

    pub fn running(&self) -> usize {
        self.runners.values().filter(|h| !h.is_finished()).count()
    }

    /// Wait up to `drain_timeout_secs` for runners to finish their current
    /// tick. Runners still busy after that are aborted.
    pub async fn shutdown(&mut self) {
        let drain = Duration::from_secs(self.config.drain_timeout_secs);
        let handles: Vec<_> = self.runners.drain().map(|(_, handle)| handle).collect();
        if handles.is_empty() {
            return;
        }
        info!(runners = handles.len(), "draining campaign runners");

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        match tokio::time::timeout(drain, futures::future::join_all(handles)).await {
            Ok(_) => info!("campaign runners drained"),
            Err(_) => {
                warn!(timeout_secs = drain.as_secs(), "drain timed out, aborting runners");
                for abort in aborts {
                    abort.abort();
                }
            }
        }
    }
}
