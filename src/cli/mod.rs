//! CLI argument parsing and command dispatch

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fleet_bench_core::{
    split_tool_args, PreparedTask, RunConfig, RunOrchestratorBuilder, StagingEntry, WorkloadTool,
};
use fleet_bench_hosts::{LocalExecutor, LocalFleet};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fleet-bench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Print debug logs to stderr
    #[arg(short = 'l', long = "extra-logs", global = true)]
    pub extra_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a synchronized IO test across the fleet
    Run(RunArgs),
    /// Validate a configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Workload tool (iozone or fio)
    pub tool: WorkloadTool,

    /// Directory holding io.py, io.json and the tool binary
    pub test_directory: PathBuf,

    /// Tool options, replacing the defaults
    #[arg(short = 'o', long = "io-opts", allow_hyphen_values = true)]
    pub io_opts: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Participant count, overriding the task definition
    #[arg(long)]
    pub participants: Option<usize>,

    /// Seconds participants may spend preparing before the start
    #[arg(long)]
    pub max_preparation_secs: Option<u64>,

    /// Extra file to stage on every host
    #[arg(long = "stage", value_name = "LOCAL=REMOTE")]
    pub stage: Vec<StagingEntry>,

    /// Directory the local host roots are created in
    #[arg(long)]
    pub workdir: Option<PathBuf>,
}

/// Install the stderr subscriber
///
/// Quiet unless `extra_logs` is set; `RUST_LOG` overrides either default.
pub fn init_logging(extra_logs: bool) {
    let default = if extra_logs { "debug" } else { "off" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_ids(true)
        .init();
}

/// Dispatch a parsed command line
pub async fn execute(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Validate { config } => validate(&config),
    }
}

fn load_config(path: Option<&Path>) -> Result<RunConfig> {
    match path {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

fn run_config(args: &RunArgs) -> Result<RunConfig> {
    let mut config = load_config(args.config.as_deref())?;

    if let Some(participants) = args.participants {
        config = config.with_participants(participants);
    }
    if let Some(secs) = args.max_preparation_secs {
        config = config.with_max_preparation_secs(secs);
    }
    for entry in &args.stage {
        config = config.with_staging(entry.clone())?;
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let config = run_config(&args)?;

    let tool_args = match &args.io_opts {
        Some(opts) => split_tool_args(opts),
        None => args.tool.default_args(&config.remote_tool_path),
    };
    let prepared = PreparedTask::prepare(&args.test_directory, &tool_args)
        .with_context(|| format!("failed to prepare {}", args.test_directory.display()))?;

    let workdir = args
        .workdir
        .clone()
        .unwrap_or_else(|| prepared.dir().join("hosts"));

    tracing::info!(
        tool = %args.tool,
        test_directory = %args.test_directory.display(),
        workdir = %workdir.display(),
        "Running test"
    );

    let orchestrator = RunOrchestratorBuilder::new()
        .config(config.clone())
        .executor(Arc::new(LocalExecutor::new()))
        .submitter(Arc::new(LocalFleet::new(workdir, config.interpreter.clone())))
        .build()?;

    let manifest = orchestrator.workload_manifest(args.tool, &args.test_directory)?;
    let report = orchestrator.run(prepared.task().clone(), manifest).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn validate(path: &Path) -> Result<ExitCode> {
    let config = load_config(Some(path))?;
    config.validate()?;
    println!("{} is valid", path.display());
    Ok(ExitCode::SUCCESS)
}
