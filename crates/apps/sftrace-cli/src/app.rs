use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use sftrace_engine::{TraceEngine, DEFAULT_DEBUG_LEVEL_NAME, DEFAULT_TRACE_DURATION};

use crate::commands_apex;
use crate::commands_lightning;
use crate::config::Config;
use crate::output::Output;
use crate::rest_client::RestClient;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "sf-trace",
    about = "Set Apex trace flags and toggle Lightning debug mode",
    version
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    Apex(ApexCommand),
    Lightning(LightningCommand),
}

#[derive(Debug, Clone, Args)]
pub struct ApexCommand {
    #[command(subcommand)]
    pub action: ApexAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ApexAction {
    /// Create or extend a USER_DEBUG trace flag.
    Trace(TraceArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TraceArgs {
    /// The org where the trace will be set.
    #[arg(short = 'o', long)]
    pub target_org: Option<String>,
    /// Username to trace, when not the currently authorized user.
    #[arg(short = 'u', long, conflicts_with = "is_autoproc_trace")]
    pub target_user: Option<String>,
    /// DeveloperName of the DebugLevel record to use.
    #[arg(short = 'l', long, default_value = DEFAULT_DEBUG_LEVEL_NAME)]
    pub debug_level_name: String,
    /// Trace the Automated Process user.
    #[arg(short = 'a', long)]
    pub is_autoproc_trace: bool,
    /// How long the trace is active for: minutes (30m) or hours (2hr), max 24 hours.
    #[arg(short = 'd', long, default_value = DEFAULT_TRACE_DURATION)]
    pub trace_duration: String,
    /// Fail instead of creating the debug level when it does not exist.
    #[arg(long)]
    pub no_provision: bool,
}

#[derive(Debug, Clone, Args)]
pub struct LightningCommand {
    #[command(subcommand)]
    pub action: LightningAction,
}

#[derive(Debug, Clone, Subcommand)]
pub enum LightningAction {
    /// Toggle Lightning debug mode for a user.
    Debug(DebugArgs),
}

#[derive(Debug, Clone, Args)]
pub struct DebugArgs {
    /// The org where the lightning debug session will be set.
    #[arg(short = 'o', long)]
    pub target_org: Option<String>,
    /// Username to toggle, when not the currently authorized user.
    #[arg(short = 'u', long)]
    pub target_user: Option<String>,
}

pub struct RuntimeContext {
    pub org_alias: String,
    pub engine: TraceEngine,
    pub output: Output,
}

impl RuntimeContext {
    pub fn load(target_org: Option<&str>, output: Output) -> Result<Self> {
        let config = Config::load()?;
        let (org_alias, profile) = config.select_org(target_org)?;
        let client = RestClient::from_profile(profile)?;
        log::debug!("connected to {} as {}", profile.instance_url, profile.username);

        Ok(Self {
            org_alias: org_alias.to_string(),
            engine: TraceEngine::new(Arc::new(client)),
            output,
        })
    }
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    let output = Output::new(cli.json, cli.quiet);
    match cli.command {
        Command::Apex(ApexCommand {
            action: ApexAction::Trace(args),
        }) => {
            let ctx = RuntimeContext::load(args.target_org.as_deref(), output)?;
            commands_apex::run_trace(&ctx, &args).await
        }
        Command::Lightning(LightningCommand {
            action: LightningAction::Debug(args),
        }) => {
            let ctx = RuntimeContext::load(args.target_org.as_deref(), output)?;
            commands_lightning::run_debug(&ctx, &args).await
        }
    }
}
