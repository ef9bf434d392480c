//! CLI command definitions.
//!
//! Each subcommand composes the topology for one deployment configuration
//! and then renders, audits, lists or hands it off.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use stackwright_policy::RuleSet;
use stackwright_topology::{Composer, DeploymentConfig, DesiredState, Inventory, OutputFormat, TopologyError};

pub mod compose;
pub mod deploy;
pub mod outputs;
pub mod validate;

/// stackwright - Deployment topology composer
#[derive(Parser)]
#[command(name = "stackwright")]
#[command(version, about = "stackwright - Deployment topology composer")]
#[command(long_about = r#"
stackwright composes the desired infrastructure topology for a containerized
web service from a small deployment configuration: load balancer ingress,
DNS and TLS, task identity, container compute, autoscaling and named exports.

COMMANDS:
  compose   → Render the desired-state document (JSON or YAML)
  validate  → Audit the composed topology against policy rules
  outputs   → List the exported outputs
  deploy    → Audit, then hand the document to a provisioning engine

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or configuration
  3 - Policy validation failure
  4 - Lookup failure (network or hosted zone not found)
  5 - Provisioning failure
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compose the desired-state document
    Compose(compose::ComposeArgs),

    /// Audit the composed topology
    Validate(validate::ValidateArgs),

    /// List exported outputs
    Outputs(outputs::OutputsArgs),

    /// Compose, audit and provision
    Deploy(deploy::DeployArgs),
}

/// Inputs shared by every command.
#[derive(Args, Debug, Clone)]
pub struct TopologyArgs {
    /// Deployment configuration file (.yaml, .yml or .toml)
    #[arg(short, long, env = "STACKWRIGHT_CONFIG")]
    pub config: PathBuf,

    /// Inventory of networks and hosted zones
    #[arg(short, long, env = "STACKWRIGHT_INVENTORY")]
    pub inventory: PathBuf,

    /// Override the environment named in the configuration
    #[arg(short, long)]
    pub environment: Option<String>,
}

/// Document format accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormatArg {
    #[default]
    Json,
    Yaml,
}

impl From<FormatArg> for OutputFormat {
    fn from(format: FormatArg) -> Self {
        match format {
            FormatArg::Json => OutputFormat::Json,
            FormatArg::Yaml => OutputFormat::Yaml,
        }
    }
}

/// Audit errors found in a composed topology.
#[derive(Debug, thiserror::Error)]
#[error("policy validation failed with {0} error(s)")]
pub struct PolicyFailure(pub usize);

/// Load the configuration and inventory, then compose.
pub async fn load_state(args: &TopologyArgs) -> Result<DesiredState> {
    let mut config = DeploymentConfig::from_file(&args.config)
        .with_context(|| format!("failed to read configuration {}", args.config.display()))?;
    if let Some(environment) = &args.environment {
        config = config.with_environment(environment.as_str());
    }

    let inventory = Inventory::load(&args.inventory)
        .await
        .map_err(TopologyError::from)
        .with_context(|| format!("failed to read inventory {}", args.inventory.display()))?;

    info!(
        "Composing topology for {} ({})",
        config.client_name, config.environment
    );
    let state = Composer::new()
        .compose(&config, &inventory, &inventory)
        .await?;
    Ok(state)
}

/// Standard rules, or the rule file when one is given.
pub fn load_rules(path: Option<&PathBuf>, disabled: &[String]) -> Result<RuleSet> {
    let mut rules = match path {
        Some(path) => RuleSet::from_file(path)
            .with_context(|| format!("failed to read rules {}", path.display()))?,
        None => RuleSet::standard(),
    };
    for id in disabled {
        rules.disable(id)?;
    }
    Ok(rules)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::fs;
    use std::path::Path;

    use super::TopologyArgs;

    pub fn write_inputs(dir: &Path) -> TopologyArgs {
        let config = dir.join("deploy.yaml");
        fs::write(
            &config,
            "clientName: acme\nenvironment: staging\ndomain: acme.io\nvpcId: vpc-123\n\
             containerEnv:\n  MAIL_FROM: noreply@acme.io\n",
        )
        .unwrap();

        let inventory = dir.join("inventory.yaml");
        fs::write(
            &inventory,
            "networks:\n  - vpcId: vpc-123\n    publicSubnetIds: [subnet-a, subnet-b]\n\
             zones:\n  - zoneId: Z123\n    name: acme.io\n",
        )
        .unwrap();

        TopologyArgs {
            config,
            inventory,
            environment: None,
        }
    }
}
