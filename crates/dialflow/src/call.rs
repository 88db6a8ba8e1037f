// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Immediate calls, outcome ingestion, and callback management.

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use dialflow_core::DialflowError;
use dialflow_core::types::{CallOutcome, CallSessionId, CallbackId};
use dialflow_scheduler::{ImmediateTarget, IngestResult, OutcomeReport, TickOutcome};

use crate::context::AppContext;
use crate::customer::require_agent;
use crate::print_json;

#[derive(Args, Debug)]
pub struct CallArgs {
    #[arg(long)]
    pub agent: String,
    /// Numbers to dial now; unknown numbers are added to the directory.
    #[arg(long, conflicts_with = "next", required_unless_present = "next")]
    pub phone: Vec<String>,
    /// Dial the N best candidates among the agent's customers.
    #[arg(long)]
    pub next: Option<usize>,
}

#[derive(Args, Debug)]
pub struct OutcomeArgs {
    #[arg(long)]
    pub session: String,
    #[arg(long)]
    pub outcome: CallOutcome,
    /// When the customer answered (RFC 3339).
    #[arg(long)]
    pub connected_at: Option<DateTime<Utc>>,
    /// When the call ended (RFC 3339); defaults to now.
    #[arg(long)]
    pub ended_at: Option<DateTime<Utc>>,
    /// Requested callback time (RFC 3339).
    #[arg(long)]
    pub callback_at: Option<DateTime<Utc>>,
    #[arg(long)]
    pub callback_reason: Option<String>,
    /// Satisfaction rating, 1 to 5.
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
    pub satisfaction: Option<u8>,
    #[arg(long)]
    pub notes: Option<String>,
    /// `objection=response`; may be repeated.
    #[arg(long, value_parser = parse_objection)]
    pub objection: Vec<(String, String)>,
}

#[derive(Subcommand, Debug)]
pub enum CallbackCommand {
    /// Callbacks still waiting to be served.
    List {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        json: bool,
    },
    Cancel { id: String },
}

fn parse_objection(raw: &str) -> Result<(String, String), String> {
    let (objection, response) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `objection=response`, got `{raw}`"))?;
    let objection = objection.trim();
    if objection.is_empty() {
        return Err("objection text must not be empty".into());
    }
    Ok((objection.to_string(), response.trim().to_string()))
}

pub async fn run_call(ctx: &AppContext, args: CallArgs) -> Result<(), DialflowError> {
    let agent_id = require_agent(ctx.storage.as_ref(), &args.agent).await?;
    let target = match args.next {
        Some(n) => ImmediateTarget::Next(n),
        None => ImmediateTarget::Phones(args.phone),
    };
    let dispatcher = ctx.dispatcher()?;
    let outcomes = dispatcher
        .dispatch_immediate(&agent_id, target, ctx.clock.now())
        .await?;

    if outcomes.is_empty() {
        println!("no eligible customers");
    }
    for outcome in outcomes {
        match outcome {
            TickOutcome::Dispatched(record) => println!(
                "dispatched session {} to customer {} (provider id {})",
                record.session_id, record.customer_id, record.provider_call_id
            ),
            TickOutcome::DispatchFailed { session_id, reason } => {
                println!("session {session_id} failed: {reason}")
            }
            TickOutcome::Skipped(reason) => println!("skipped: {reason:?}"),
            TickOutcome::Completed | TickOutcome::Inactive => {}
        }
    }
    Ok(())
}

pub async fn run_outcome(ctx: &AppContext, args: OutcomeArgs) -> Result<(), DialflowError> {
    let report = OutcomeReport {
        session_id: CallSessionId::from(args.session.as_str()),
        outcome: args.outcome,
        connected_at: args.connected_at,
        ended_at: args.ended_at,
        callback_at: args.callback_at,
        callback_reason: args.callback_reason,
        satisfaction: args.satisfaction,
        notes: args.notes,
        objections: args.objection,
    };
    match ctx.learner().ingest(report).await? {
        IngestResult::Applied {
            before,
            after,
            callback_id,
        } => {
            println!("recorded {}: interest {before} -> {after}", args.outcome);
            if let Some(id) = callback_id {
                println!("callback scheduled: {id}");
            }
        }
        IngestResult::AlreadyConcluded => println!("session already concluded, nothing changed"),
    }
    Ok(())
}

pub async fn run_callback(ctx: &AppContext, cmd: CallbackCommand) -> Result<(), DialflowError> {
    match cmd {
        CallbackCommand::List { agent, json } => {
            let agent_id = require_agent(ctx.storage.as_ref(), &agent).await?;
            let callbacks = ctx.storage.list_pending_callbacks(&agent_id).await?;
            if json {
                return print_json(&callbacks);
            }
            for cb in callbacks {
                println!(
                    "{}  {}  p{}  customer={} campaign={}  {}",
                    cb.id,
                    cb.scheduled_for.to_rfc3339(),
                    cb.priority,
                    cb.customer_id,
                    cb.campaign_id.as_ref().map_or("-", |c| c.as_str()),
                    cb.reason
                );
            }
            Ok(())
        }
        CallbackCommand::Cancel { id } => {
            let id = CallbackId::from(id.as_str());
            if !ctx.storage.cancel_callback(&id).await? {
                return Err(DialflowError::InvalidInput(format!(
                    "callback {id} does not exist or is no longer scheduled"
                )));
            }
            println!("cancelled callback {id}");
            Ok(())
        }
    }
}
