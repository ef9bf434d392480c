//! stackwright CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or configuration
//! - 3: Policy validation failure
//! - 4: Lookup failure (network or hosted zone not found)
//! - 5: Provisioning failure

use std::process::ExitCode;

use clap::Parser;
use stackwright_topology::TopologyError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, PolicyFailure};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_CONFIG: u8 = 2;
    pub const POLICY_FAILURE: u8 = 3;
    pub const LOOKUP_ERROR: u8 = 4;
    pub const PROVISIONING_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let result = match cli.command {
        Commands::Compose(args) => commands::compose::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Outputs(args) => commands::outputs::execute(args).await,
        Commands::Deploy(args) => commands::deploy::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref(), cli.verbose, cli.quiet);

    // Logs go to stderr so documents on stdout stay machine-readable.
    let (json, plain) = if cli.log_json {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (
            None,
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
        )
    };

    let log_result = tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .with(plain)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// `RUST_LOG` (or the default) as the base; `--verbose`/`--quiet` override it for stackwright targets.
fn log_filter(rust_log: Option<&str>, verbose: bool, quiet: bool) -> EnvFilter {
    let mut filter = rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(directives_for("info")));

    let level = if verbose {
        Some("debug")
    } else if quiet {
        Some("warn")
    } else {
        None
    };
    if let Some(level) = level {
        for directive in directives_for(level).split(',').skip(1) {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

fn directives_for(level: &str) -> String {
    format!("warn,stackwright={level},stackwright_topology={level},stackwright_policy={level}")
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if e.downcast_ref::<PolicyFailure>().is_some() {
        return ExitCodes::POLICY_FAILURE;
    }

    match e.downcast_ref::<TopologyError>() {
        Some(TopologyError::Config(_)) | Some(TopologyError::Toml(_)) | Some(TopologyError::Yaml(_)) => {
            ExitCodes::INVALID_CONFIG
        }
        Some(TopologyError::Render { .. }) => ExitCodes::GENERAL_ERROR,
        Some(TopologyError::Lookup(_)) => ExitCodes::LOOKUP_ERROR,
        Some(TopologyError::Provisioning(_)) => ExitCodes::PROVISIONING_ERROR,
        Some(_) => ExitCodes::GENERAL_ERROR,
        None => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("argument") || msg.contains("option") {
                ExitCodes::INVALID_CONFIG
            } else {
                ExitCodes::GENERAL_ERROR
            }
        }
    }
}
