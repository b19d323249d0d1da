mod bootstrap_helpers;
mod cli_args;
mod startup;

use anyhow::Result;
use clap::Parser;

use crate::bootstrap_helpers::init_tracing;
use crate::cli_args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded before parsing so `.env` values act as clap env fallbacks.
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();
    cli.validate()?;
    startup::run_bridge(cli).await
}
