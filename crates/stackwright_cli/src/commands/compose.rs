//! Compose command - Render the desired-state document.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use stackwright_topology::OutputFormat;

use super::{load_state, FormatArg, TopologyArgs};

#[derive(Args)]
pub struct ComposeArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,

    /// Document format
    #[arg(short, long, value_enum, default_value_t = FormatArg::Json)]
    pub format: FormatArg,

    /// Write the document to a file instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

pub async fn execute(args: ComposeArgs) -> Result<()> {
    let state = load_state(&args.topology).await?;
    let format = OutputFormat::from(args.format);

    match &args.out {
        Some(path) => {
            state.write_to(path, format)?;
            eprintln!(
                "✅ Composed {} resources for {} into {}",
                state.resources.len(),
                state.metadata.name_prefix,
                path.display()
            );
        }
        None => {
            info!("Rendering {} document", format);
            println!("{}", state.render(format)?);
        }
    }

    Ok(())
}
