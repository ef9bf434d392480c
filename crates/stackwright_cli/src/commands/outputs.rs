//! Outputs command - List exported outputs.

use anyhow::Result;
use clap::Args;

use super::{load_state, TopologyArgs};

#[derive(Args)]
pub struct OutputsArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,

    /// Print the outputs as a JSON array
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: OutputsArgs) -> Result<()> {
    let state = load_state(&args.topology).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&state.outputs)?);
        return Ok(());
    }

    let width = state.outputs.iter().map(|o| o.key.len()).max().unwrap_or(0);
    for output in &state.outputs {
        println!(
            "{:width$}  {}  # {}",
            output.key,
            output.value,
            output.description,
            width = width
        );
    }

    Ok(())
}
