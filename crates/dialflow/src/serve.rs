// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dialflow serve` command implementation.
//!
//! Opens storage, builds the configured telephony adapter, and runs the
//! campaign supervisor until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use dialflow_config::model::DialflowConfig;
use dialflow_core::types::HealthStatus;
use dialflow_core::{DialflowError, PluginAdapter, StorageAdapter};
use dialflow_scheduler::campaign::default_filter;
use dialflow_scheduler::{Dispatcher, Scheduler};
use dialflow_telephony::build_telephony;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::shutdown;

/// Runs the `dialflow serve` command.
pub async fn run_serve(config: DialflowConfig) -> Result<(), DialflowError> {
    info!(service = %config.service.name, "starting dialflow serve");

    let ctx = AppContext::open(config).await?;
    report_open_sessions(ctx.storage.as_ref()).await?;

    let telephony = build_telephony(&ctx.config.telephony)?;
    match telephony.health_check().await {
        Ok(HealthStatus::Healthy) => info!(adapter = telephony.name(), "telephony ready"),
        Ok(status) => warn!(adapter = telephony.name(), ?status, "telephony not healthy, continuing"),
        Err(e) => warn!(adapter = telephony.name(), error = %e, "telephony health check failed, continuing"),
    }

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&ctx.storage),
        telephony,
        Duration::from_secs(ctx.config.telephony.timeout_secs),
        default_filter(&ctx.config.campaign_defaults),
    )
    .with_utc_offset(ctx.config.scheduler.utc_offset_minutes)?);
    let scheduler = Scheduler::new(
        Arc::clone(&ctx.storage),
        Arc::clone(&ctx.clock),
        dispatcher,
        ctx.config.scheduler.clone(),
    );

    log_memory_stats("startup");
    let cancel = shutdown::install_signal_handler();
    scheduler.run(cancel).await?;
    log_memory_stats("shutdown");

    ctx.close().await?;
    info!("dialflow serve shutdown complete");
    Ok(())
}

/// Calls dispatched before a restart still await their outcome; they keep
/// their customers locked until it arrives.
async fn report_open_sessions(storage: &dyn StorageAdapter) -> Result<(), DialflowError> {
    for agent in storage.list_agents().await? {
        let open = storage.list_open_sessions(&agent.id).await?;
        if !open.is_empty() {
            info!(agent_id = %agent.id, count = open.len(), "calls awaiting outcome from before restart");
        }
    }
    Ok(())
}

/// Reads jemalloc heap statistics, refreshing the stats epoch first.
/// Returns `(allocated, resident)` in bytes, zero when unavailable.
#[cfg(not(target_env = "msvc"))]
fn memory_stats() -> (usize, usize) {
    let _ = tikv_jemalloc_ctl::epoch::advance();
    let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
    let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
    (allocated, resident)
}

#[cfg(not(target_env = "msvc"))]
fn log_memory_stats(stage: &str) {
    let (allocated, resident) = memory_stats();
    info!(stage, allocated_bytes = allocated, resident_bytes = resident, "heap usage");
}

#[cfg(target_env = "msvc")]
fn log_memory_stats(_stage: &str) {}
