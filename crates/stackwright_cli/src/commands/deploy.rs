//! Deploy command - Audit the topology and hand it to a provisioning engine.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use stackwright_policy::AuditSummary;
use stackwright_topology::{CommandEngine, ProvisioningEngine, TopologyError};

use super::{load_rules, load_state, validate, PolicyFailure, TopologyArgs};

#[derive(Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,

    /// Engine command line; receives the JSON document on stdin.
    /// Split on whitespace without quoting; use --engine-arg for arguments with spaces
    #[arg(long, env = "STACKWRIGHT_ENGINE")]
    pub engine: String,

    /// Extra engine argument, passed verbatim (repeatable)
    #[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Rule file to use instead of the standard rules
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Rule ids to skip
    #[arg(long = "disable", value_name = "RULE_ID")]
    pub disabled: Vec<String>,

    /// Compose and audit without invoking the engine
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(args: DeployArgs) -> Result<()> {
    let engine = CommandEngine::from_command_line(&args.engine)
        .context("engine command line is empty")?
        .args(args.engine_args.iter().cloned());

    let state = load_state(&args.topology).await?;
    let rules = load_rules(args.rules.as_ref(), &args.disabled)?;

    println!("🛡️  Auditing {} resources...", state.resources.len());
    let violations = rules.evaluate(&state);
    validate::report(&violations);

    let summary = AuditSummary::from_violations(&violations);
    if !summary.passed() {
        warn!("Refusing to provision {}", state.metadata.name_prefix);
        return Err(PolicyFailure(summary.errors).into());
    }

    if args.dry_run {
        println!("✅ Dry run: {} is ready for {}", state.metadata.name_prefix, engine.name());
        return Ok(());
    }

    info!(
        "Provisioning {} (composition {})",
        state.metadata.name_prefix, state.metadata.composition_id
    );
    println!("🚀 Provisioning with {}...", engine.name());

    let report = engine.apply(&state).await.map_err(TopologyError::from)?;
    if !report.output.is_empty() {
        print!("{}", report.output);
    }
    println!("✅ {} applied {}", report.engine, state.metadata.name_prefix);

    Ok(())
}
