// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dialflow campaign` subcommands.

use clap::{Args, Subcommand};
use dialflow_core::DialflowError;
use dialflow_core::types::{Campaign, CampaignId, CampaignStatus, InterestLevel, TimeWindow};
use dialflow_scheduler::{CampaignEdit, CampaignSpec};

use crate::context::AppContext;
use crate::customer::require_agent;
use crate::print_json;

#[derive(Subcommand, Debug)]
pub enum CampaignCommand {
    /// Create a campaign; omitted settings come from [campaign_defaults].
    Create(CreateArgs),
    Launch { id: String },
    Pause { id: String },
    Resume { id: String },
    /// Cancel a campaign. Calls already placed still report outcomes.
    Stop { id: String },
    /// Change a draft or paused campaign.
    Edit(EditArgs),
    List {
        #[arg(long)]
        status: Option<CampaignStatus>,
        #[arg(long)]
        json: bool,
    },
    Stats {
        id: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub agent: String,
    #[arg(long)]
    pub name: String,
    /// Grouping label, e.g. `new_leads`.
    #[arg(long, default_value = dialflow_scheduler::campaign::DEFAULT_CAMPAIGN_TYPE)]
    pub campaign_type: String,
    #[arg(long)]
    pub calls_per_hour: Option<u32>,
    /// Window opening, HH:MM.
    #[arg(long)]
    pub start: Option<String>,
    /// Window closing, HH:MM (exclusive).
    #[arg(long)]
    pub end: Option<String>,
    /// Comma-separated interest levels to enroll.
    #[arg(long, value_delimiter = ',')]
    pub interest: Vec<InterestLevel>,
    #[arg(long)]
    pub max_days_since_last_call: Option<u32>,
    #[arg(long)]
    pub max_customers: Option<u32>,
    #[arg(long)]
    pub start_immediately: bool,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub campaign_type: Option<String>,
    #[arg(long)]
    pub calls_per_hour: Option<u32>,
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,
    #[arg(long, value_delimiter = ',')]
    pub interest: Vec<InterestLevel>,
    #[arg(long)]
    pub max_days_since_last_call: Option<u32>,
    #[arg(long)]
    pub max_customers: Option<u32>,
}

pub async fn run(ctx: &AppContext, cmd: CampaignCommand) -> Result<(), DialflowError> {
    let manager = ctx.campaigns();
    match cmd {
        CampaignCommand::Create(args) => {
            let agent_id = require_agent(ctx.storage.as_ref(), &args.agent).await?;
            let defaults = &ctx.config.campaign_defaults;
            let mut spec = CampaignSpec::from_defaults(args.name, agent_id, defaults)?;
            spec.campaign_type = args.campaign_type;
            if let Some(rate) = args.calls_per_hour {
                spec.calls_per_hour = rate;
            }
            spec.window = TimeWindow::parse(
                args.start.as_deref().unwrap_or(&defaults.start_time),
                args.end.as_deref().unwrap_or(&defaults.end_time),
            )?;
            if !args.interest.is_empty() {
                spec.filter.interest_levels = args.interest;
            }
            if let Some(days) = args.max_days_since_last_call {
                spec.filter.max_days_since_last_call = days;
            }
            if let Some(max) = args.max_customers {
                spec.filter.max_customers = max;
            }
            spec.start_immediately = args.start_immediately;

            let campaign = manager.create(spec).await?;
            println!("{} ({})", campaign.id, campaign.status);
            Ok(())
        }
        CampaignCommand::Launch { id } => report(manager.launch(&CampaignId::from(id.as_str())).await?),
        CampaignCommand::Pause { id } => report(manager.pause(&CampaignId::from(id.as_str())).await?),
        CampaignCommand::Resume { id } => report(manager.resume(&CampaignId::from(id.as_str())).await?),
        CampaignCommand::Stop { id } => report(manager.stop(&CampaignId::from(id.as_str())).await?),
        CampaignCommand::Edit(args) => {
            let id = CampaignId::from(args.id.as_str());
            let current = manager.get(&id).await?;
            let window = match (args.start, args.end) {
                (None, None) => None,
                (start, end) => Some(TimeWindow::parse(
                    start.as_deref().unwrap_or(&current.window.start.format("%H:%M:%S").to_string()),
                    end.as_deref().unwrap_or(&current.window.end.format("%H:%M:%S").to_string()),
                )?),
            };
            let filter_changed = !args.interest.is_empty()
                || args.max_days_since_last_call.is_some()
                || args.max_customers.is_some();
            let filter = filter_changed.then(|| {
                let mut filter = current.filter.clone();
                if !args.interest.is_empty() {
                    filter.interest_levels = args.interest.clone();
                }
                if let Some(days) = args.max_days_since_last_call {
                    filter.max_days_since_last_call = days;
                }
                if let Some(max) = args.max_customers {
                    filter.max_customers = max;
                }
                filter
            });

            let edit = CampaignEdit {
                name: args.name,
                campaign_type: args.campaign_type,
                calls_per_hour: args.calls_per_hour,
                window,
                filter,
            };
            report(manager.edit(&id, edit).await?)
        }
        CampaignCommand::List { status, json } => {
            let campaigns = manager.list(status).await?;
            if json {
                return print_json(&campaigns);
            }
            for c in campaigns {
                println!(
                    "{}  {:<24} {:<12} {:<9} {}/h {}-{} completed={} success={:.1}%",
                    c.id,
                    c.name,
                    c.campaign_type,
                    c.status,
                    c.calls_per_hour,
                    c.window.start.format("%H:%M"),
                    c.window.end.format("%H:%M"),
                    c.calls_completed,
                    c.success_rate(),
                );
            }
            Ok(())
        }
        CampaignCommand::Stats { id, json } => {
            let stats = manager.stats(&CampaignId::from(id.as_str())).await?;
            if json {
                return print_json(&stats);
            }
            let c = &stats.campaign;
            println!("campaign        {} ({})", c.name, c.id);
            println!("type            {}", c.campaign_type);
            println!("status          {}", c.status);
            println!("rate            {}/h, {}-{}", c.calls_per_hour, c.window.start.format("%H:%M"), c.window.end.format("%H:%M"));
            println!("pool            {}", stats.pool_size);
            println!("calls completed {}", c.calls_completed);
            println!("successful      {} ({:.1}%)", c.successful_calls, stats.success_rate);
            println!("conversions     {}", c.conversions);
            println!("in flight       {}", stats.open_sessions);
            println!("callbacks       {}", stats.pending_callbacks);
            match stats.last_dispatch {
                Some(at) => println!("last dispatch   {}", at.to_rfc3339()),
                None => println!("last dispatch   -"),
            }
            Ok(())
        }
    }
}

fn report(campaign: Campaign) -> Result<(), DialflowError> {
    println!("campaign {} is now {}", campaign.id, campaign.status);
    Ok(())
}
