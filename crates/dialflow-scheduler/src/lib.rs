// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campaign scheduling for Dialflow.
//!
//! - [`ticker`] turns a calls-per-hour rate and a daily window into permits.
//! - [`selector`] ranks customers and picks who to call next.
//! - [`dispatcher`] places one call per permit through the storage guard.
//! - [`learner`] folds call outcomes back into customer priority.
//! - [`campaign`] owns creation, lifecycle actions, edits, and stats.
//! - [`runner`] hosts the per-campaign tasks and their supervisor.

pub mod campaign;
pub mod dispatcher;
pub mod learner;
pub mod runner;
pub mod selector;
pub mod ticker;

pub use campaign::{CampaignEdit, CampaignManager, CampaignSpec, CampaignStats};
pub use dispatcher::{DispatchRecord, Dispatcher, ImmediateTarget, SkipReason, TickOutcome};
pub use learner::{IngestResult, Learner, OutcomeReport, shift_interest};
pub use runner::{CampaignRunner, Scheduler};
pub use selector::{Candidate, Tier, rank_candidates, select_candidate};
pub use ticker::{Permit, Slot, Ticker};
