// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dialflow - outbound call campaign scheduler.
//!
//! This is the binary entry point: the campaign service (`serve`) and the
//! commands that manage agents, customers, campaigns, and calls.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod agent;
mod call;
mod campaign;
mod context;
mod customer;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dialflow_config::model::DialflowConfig;
use dialflow_core::DialflowError;

use crate::context::AppContext;

/// Dialflow - outbound call campaign scheduler.
#[derive(Parser, Debug)]
#[command(name = "dialflow", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run campaign runners until SIGINT/SIGTERM.
    Serve,
    /// Manage calling agents.
    #[command(subcommand)]
    Agent(agent::AgentCommand),
    /// Manage the customer directory.
    #[command(subcommand)]
    Customer(customer::CustomerCommand),
    /// Create and control campaigns.
    #[command(subcommand)]
    Campaign(campaign::CampaignCommand),
    /// Place immediate calls outside any campaign.
    Call(call::CallArgs),
    /// Record the outcome of a finished call.
    Outcome(call::OutcomeArgs),
    /// Inspect and cancel scheduled callbacks.
    #[command(subcommand)]
    Callback(call::CallbackCommand),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => dialflow_config::load_and_validate_path(path),
        None => dialflow_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            dialflow_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.service.log_level);

    let Some(command) = cli.command else {
        println!("dialflow: use --help for available commands");
        return;
    };

    if let Err(e) = run(command, config).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: DialflowConfig) -> Result<(), DialflowError> {
    if let Commands::Serve = command {
        return serve::run_serve(config).await;
    }

    let ctx = AppContext::open(config).await?;
    let result = match command {
        Commands::Serve => Ok(()),
        Commands::Agent(cmd) => agent::run(&ctx, cmd).await,
        Commands::Customer(cmd) => customer::run(&ctx, cmd).await,
        Commands::Campaign(cmd) => campaign::run(&ctx, cmd).await,
        Commands::Call(args) => call::run_call(&ctx, args).await,
        Commands::Outcome(args) => call::run_outcome(&ctx, args).await,
        Commands::Callback(cmd) => call::run_callback(&ctx, cmd).await,
    };
    ctx.close().await?;
    result
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dialflow={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

/// Print `value` as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), DialflowError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| DialflowError::Internal(format!("failed to encode output: {e}")))?;
    println!("{text}");
    Ok(())
}
