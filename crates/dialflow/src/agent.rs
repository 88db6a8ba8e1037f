// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dialflow agent` subcommands.

use clap::{Args, Subcommand};
use dialflow_core::DialflowError;
use dialflow_core::types::{Agent, AgentId, AgentStatus};

use crate::context::AppContext;
use crate::print_json;

#[derive(Subcommand, Debug)]
pub enum AgentCommand {
    /// Create a calling agent.
    Create(CreateArgs),
    /// List agents with their performance counters.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Stop all dispatches for an agent.
    Pause { id: String },
    /// Allow a paused agent to dispatch again.
    Resume { id: String },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub name: String,
    /// Upper bound on calls placed per UTC day.
    #[arg(long, default_value_t = 100)]
    pub max_daily_calls: u32,
}

pub async fn run(ctx: &AppContext, cmd: AgentCommand) -> Result<(), DialflowError> {
    match cmd {
        AgentCommand::Create(args) => {
            if args.name.trim().is_empty() {
                return Err(DialflowError::InvalidInput("agent name must not be empty".into()));
            }
            let agent = Agent::new(args.name, args.max_daily_calls, ctx.clock.now());
            ctx.storage.create_agent(&agent).await?;
            println!("{}", agent.id);
            Ok(())
        }
        AgentCommand::List { json } => {
            let agents = ctx.storage.list_agents().await?;
            if json {
                return print_json(&agents);
            }
            for agent in agents {
                println!(
                    "{}  {:<20} {:<8} calls={} conversion={:.1}% satisfaction={}",
                    agent.id,
                    agent.name,
                    agent.status,
                    agent.calls_handled,
                    agent.conversion_rate(),
                    agent
                        .average_satisfaction()
                        .map_or_else(|| "-".to_string(), |s| format!("{s:.1}")),
                );
            }
            Ok(())
        }
        AgentCommand::Pause { id } => set_status(ctx, &id, AgentStatus::Paused).await,
        AgentCommand::Resume { id } => resume(ctx, &id).await,
    }
}

async fn set_status(ctx: &AppContext, id: &str, status: AgentStatus) -> Result<(), DialflowError> {
    let id = AgentId::from(id);
    if !ctx.storage.set_agent_status(&id, status).await? {
        return Err(DialflowError::not_found("agent", &id));
    }
    println!("agent {id} is now {status}");
    Ok(())
}

/// A resumed agent returns to `learning` until it has handled enough calls.
async fn resume(ctx: &AppContext, id: &str) -> Result<(), DialflowError> {
    let agent = ctx
        .storage
        .get_agent(&AgentId::from(id))
        .await?
        .ok_or_else(|| DialflowError::not_found("agent", id))?;
    let status = if agent.calls_handled >= dialflow_core::types::AGENT_ACTIVATION_CALLS {
        AgentStatus::Active
    } else {
        AgentStatus::Learning
    };
    set_status(ctx, id, status).await
}
