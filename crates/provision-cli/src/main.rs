//! Provisioner CLI
//!
//! The `provision` command is the trigger adapter for shells, CI jobs and
//! webhook responders.
//!
//! ## Commands
//!
//! - `plan`: validate parameters and print the resource graph
//! - `apply`: manual invocation against the configured backend
//! - `push`: invocation driven by a VCS push webhook body
//! - `incident`: invocation driven by an incident-management callback
//!
//! `apply` prints the outcome summary; `push` and `incident` print the relay
//! JSON for the caller to forward. The exit code is 0 only on success.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use provision_api::{ApiConfig, InfraApi, MemoryInfraApi, RestInfraApi};
use provision_core::{
    plan, ApplyOptions, IncidentPayload, Orchestrator, ParameterBag, Relay, TriggerEvent,
    VcsPushPayload, METRICS,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "provision")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parameter-driven compute provisioning", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Backend the invocation runs against
    #[arg(long, global = true, value_enum, default_value_t = Backend::Rest)]
    backend: Backend,

    /// Compute API base URL
    #[arg(long, global = true, env = "PROVISION_API_URL")]
    api_url: Option<String>,

    /// Bearer token for the compute API
    #[arg(long, global = true, env = "PROVISION_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Maximum number of resources applied concurrently
    #[arg(long, global = true, env = "PROVISION_MAX_CONCURRENT", default_value_t = 4)]
    max_concurrent: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Compute REST API
    Rest,
    /// Empty in-memory backend (dry run)
    Memory,
}

/// Where an invocation's parameters come from.
#[derive(Args, Debug, Default)]
struct ParamSource {
    /// JSON object of parameters
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Single `name=value` parameter; overrides the file
    #[arg(long = "param", value_name = "NAME=VALUE")]
    assignments: Vec<String>,

    /// JSON object of defaults filled in under the supplied parameters
    #[arg(long)]
    defaults: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate parameters and show the resource graph without applying it
    Plan {
        #[command(flatten)]
        source: ParamSource,
    },

    /// Apply the configuration described by the parameters
    Apply {
        #[command(flatten)]
        source: ParamSource,

        /// Invocation id (random when omitted)
        #[arg(long)]
        invocation_id: Option<String>,
    },

    /// Apply on behalf of a VCS push
    Push {
        /// Push webhook body (JSON)
        #[arg(short, long)]
        event: PathBuf,

        #[command(flatten)]
        source: ParamSource,
    },

    /// Apply on behalf of an incident; parameters come from its fields
    Incident {
        /// Incident callback body (JSON)
        #[arg(long)]
        payload: PathBuf,

        /// JSON object of defaults filled in under the incident fields
        #[arg(long)]
        defaults: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    provision_core::init_tracing(cli.json, level);

    let succeeded = match &cli.command {
        Commands::Plan { source } => cmd_plan(source)?,
        Commands::Apply {
            source,
            invocation_id,
        } => {
            let event = match invocation_id {
                Some(id) => TriggerEvent::Manual {
                    invocation_id: id.clone(),
                },
                None => TriggerEvent::manual(),
            };
            let bag = load_bag(source)?;
            let relay = orchestrator(&cli)?.handle(&event, &bag).await;
            print_summary(&relay)?;
            relay.status == provision_core::OutcomeStatus::Success
        }
        Commands::Push { event, source } => {
            let payload: VcsPushPayload = read_json(event)?;
            let bag = load_bag(source)?;
            let relay = orchestrator(&cli)?
                .handle(&payload.into_event(), &bag)
                .await;
            print_relay(&relay)?;
            relay.status == provision_core::OutcomeStatus::Success
        }
        Commands::Incident { payload, defaults } => {
            let payload: IncidentPayload = read_json(payload)?;
            let (event, mut bag) = payload
                .into_parts()
                .context("Invalid incident fields")?;
            if let Some(path) = defaults {
                bag.merge_defaults(&read_bag(path)?);
            }
            let relay = orchestrator(&cli)?.handle(&event, &bag).await;
            print_relay(&relay)?;
            relay.status == provision_core::OutcomeStatus::Success
        }
    };

    METRICS.flush();
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn backend(cli: &Cli) -> Result<Arc<dyn InfraApi>> {
    match cli.backend {
        Backend::Memory => {
            info!("Using in-memory backend; nothing will be provisioned");
            Ok(Arc::new(MemoryInfraApi::new()))
        }
        Backend::Rest => {
            let mut config = match &cli.api_url {
                Some(url) => ApiConfig::new(url),
                None => ApiConfig::from_env(),
            };
            if let Some(token) = &cli.api_token {
                config = config.with_token(token);
            }
            info!("Using compute API at {}", config.base_url);
            let api = RestInfraApi::new(config).context("Failed to build compute API client")?;
            Ok(Arc::new(api))
        }
    }
}

fn orchestrator(cli: &Cli) -> Result<Orchestrator> {
    let options = ApplyOptions {
        max_concurrent: cli.max_concurrent,
    };
    Ok(Orchestrator::new(backend(cli)?, options))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn read_bag(path: &Path) -> Result<ParameterBag> {
    let value: serde_json::Value = read_json(path)?;
    ParameterBag::from_json(&value).with_context(|| format!("Invalid parameters in {}", path.display()))
}

/// File parameters, then `--param` overrides, then defaults for what is left.
fn load_bag(source: &ParamSource) -> Result<ParameterBag> {
    let mut bag = match &source.params {
        Some(path) => read_bag(path)?,
        None => ParameterBag::new(),
    };
    for raw in &source.assignments {
        let (name, value) = ParameterBag::parse_assignment(raw)?;
        bag.insert(name, value);
    }
    if let Some(path) = &source.defaults {
        bag.merge_defaults(&read_bag(path)?);
    }
    Ok(bag)
}

#[derive(Serialize)]
struct PlanView {
    fingerprint: String,
    order: Vec<String>,
    levels: Vec<Vec<String>>,
}

fn plan_view(bag: &ParameterBag) -> provision_core::Result<PlanView> {
    let plan = plan(bag)?;
    Ok(PlanView {
        fingerprint: plan.config.fingerprint(),
        order: plan
            .graph
            .nodes()
            .map(|def| format!("{} {}", def.kind(), def.key))
            .collect(),
        levels: plan
            .graph
            .levels()
            .into_iter()
            .map(|level| level.into_iter().map(|key| key.path()).collect())
            .collect(),
    })
}

fn cmd_plan(source: &ParamSource) -> Result<bool> {
    let bag = load_bag(source)?;
    let _span = provision_core::InvocationSpan::enter("plan");

    match plan_view(&bag) {
        Ok(view) => {
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(true)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(false)
        }
    }
}

fn print_summary(relay: &Relay) -> Result<()> {
    match &relay.message {
        provision_core::RelayMessage::Console { summary } => {
            println!("{summary}");
            Ok(())
        }
        _ => print_relay(relay),
    }
}

fn print_relay(relay: &Relay) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(relay)?);
    Ok(())
}
