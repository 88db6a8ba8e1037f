// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `dialflow customer` subcommands, including CSV import.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use dialflow_core::types::{AgentId, Customer, CustomerId, InterestLevel};
use dialflow_core::{DialflowError, StorageAdapter};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::AppContext;
use crate::print_json;

#[derive(Subcommand, Debug)]
pub enum CustomerCommand {
    /// Add one customer (existing phone numbers are left unchanged).
    Add(AddArgs),
    /// Import customers from a CSV file with `phone,name,interest` columns.
    Import {
        #[arg(long)]
        agent: String,
        file: PathBuf,
    },
    /// Set (or with --clear, remove) the do-not-call flag.
    Dnc {
        id: String,
        #[arg(long)]
        clear: bool,
    },
    /// Archive a customer; history is kept and no further calls are placed.
    Archive { id: String },
    /// List an agent's customers.
    List {
        #[arg(long)]
        agent: String,
        /// Include archived customers.
        #[arg(long)]
        all: bool,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(long)]
    pub agent: String,
    #[arg(long)]
    pub phone: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, default_value = "warm")]
    pub interest: InterestLevel,
}

pub async fn run(ctx: &AppContext, cmd: CustomerCommand) -> Result<(), DialflowError> {
    match cmd {
        CustomerCommand::Add(args) => {
            let agent_id = require_agent(ctx.storage.as_ref(), &args.agent).await?;
            let phone = args.phone.trim().to_string();
            if phone.is_empty() {
                return Err(DialflowError::InvalidInput("phone number must not be empty".into()));
            }
            let name = args.name.unwrap_or_else(|| phone.clone());
            let customer = Customer::new(agent_id, phone, name, ctx.clock.now())
                .with_interest(args.interest);
            let stored = ctx.storage.upsert_customer(&customer).await?;
            if stored.id != customer.id {
                println!("{} (already present)", stored.id);
            } else {
                println!("{}", stored.id);
            }
            Ok(())
        }
        CustomerCommand::Import { agent, file } => {
            let agent_id = require_agent(ctx.storage.as_ref(), &agent).await?;
            let reader = std::fs::File::open(&file).map_err(|e| {
                DialflowError::InvalidInput(format!("cannot open {}: {e}", file.display()))
            })?;
            let summary =
                import_customers(ctx.storage.as_ref(), &agent_id, reader, ctx.clock.now()).await?;
            println!(
                "imported {} new, {} already present, {} rejected",
                summary.added, summary.existing, summary.rejected
            );
            Ok(())
        }
        CustomerCommand::Dnc { id, clear } => {
            let id = CustomerId::from(id.as_str());
            if !ctx.storage.set_do_not_call(&id, !clear).await? {
                return Err(DialflowError::not_found("customer", &id));
            }
            let state = if clear { "cleared" } else { "set" };
            println!("do-not-call {state} for {id}");
            Ok(())
        }
        CustomerCommand::Archive { id } => {
            let id = CustomerId::from(id.as_str());
            if !ctx.storage.archive_customer(&id, ctx.clock.now()).await? {
                if ctx.storage.get_customer(&id).await?.is_none() {
                    return Err(DialflowError::not_found("customer", &id));
                }
                println!("{id} was already archived");
                return Ok(());
            }
            println!("archived {id}");
            Ok(())
        }
        CustomerCommand::List { agent, all, json } => {
            let agent_id = require_agent(ctx.storage.as_ref(), &agent).await?;
            let customers: Vec<Customer> = ctx
                .storage
                .list_customers(&agent_id)
                .await?
                .into_iter()
                .filter(|c| all || c.archived_at.is_none())
                .collect();
            if json {
                return print_json(&customers);
            }
            for c in customers {
                let flags = match (c.do_not_call, c.archived_at.is_some()) {
                    (true, true) => " [dnc, archived]",
                    (true, false) => " [dnc]",
                    (false, true) => " [archived]",
                    (false, false) => "",
                };
                println!(
                    "{}  {:<16} {:<20} {:<9} calls={}/{}{}",
                    c.id, c.phone_number, c.name, c.interest_level, c.successful_calls, c.total_calls, flags
                );
            }
            Ok(())
        }
    }
}

pub(crate) async fn require_agent(
    storage: &dyn StorageAdapter,
    id: &str,
) -> Result<AgentId, DialflowError> {
    let id = AgentId::from(id);
    if storage.get_agent(&id).await?.is_none() {
        return Err(DialflowError::not_found("agent", &id));
    }
    Ok(id)
}

#[derive(Debug, Deserialize)]
struct ImportRow {
    phone: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    interest: Option<InterestLevel>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    pub existing: usize,
    pub rejected: usize,
}

/// Read `phone,name,interest` rows and upsert each as a customer.
///
/// `name` defaults to the phone number and `interest` to `warm`. Rows that
/// fail to parse or have an empty phone are counted as rejected and logged.
pub async fn import_customers<R: std::io::Read>(
    storage: &dyn StorageAdapter,
    agent_id: &AgentId,
    reader: R,
    now: DateTime<Utc>,
) -> Result<ImportSummary, DialflowError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let mut summary = ImportSummary::default();

    for (line, row) in csv.deserialize::<ImportRow>().enumerate() {
        let row = match row {
            Ok(row) if !row.phone.is_empty() => row,
            Ok(_) => {
                warn!(line = line + 2, "skipping row without a phone number");
                summary.rejected += 1;
                continue;
            }
            Err(e) => {
                warn!(line = line + 2, error = %e, "skipping malformed row");
                summary.rejected += 1;
                continue;
            }
        };

        let name = row
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| row.phone.clone());
        let customer = Customer::new(agent_id.clone(), row.phone, name, now)
            .with_interest(row.interest.unwrap_or(InterestLevel::Warm));
        let stored = storage.upsert_customer(&customer).await?;
        if stored.id == customer.id {
            summary.added += 1;
        } else {
            summary.existing += 1;
        }
    }
    Ok(summary)
}
