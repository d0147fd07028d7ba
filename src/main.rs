//! fleet-bench - Synchronized-start IO benchmarks across a fleet of hosts

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.extra_logs);

    tracing::debug!("fleet-bench starting...");

    cli::execute(cli).await
}
