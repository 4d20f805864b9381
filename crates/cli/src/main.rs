//! Medallion CLI
//!
//! Drives transformation runs over landed JSON batches and inspects the
//! persisted warehouse.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{RunArgs, ShowArgs};
use medallion_config::{MedallionConfig, ObservabilityConfig};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "medallion",
    version,
    about = "Medallion transformation core - Bronze rows to a Silver star schema and Gold aggregates",
    long_about = "Runs the Bronze -> Silver -> Gold transformation over landed batches.\n\n\
                  Each input file is either a batch object, an array of batches, or a bare\n\
                  array of rows whose entity type is derived from the file name."
)]
struct Cli {
    /// YAML configuration file
    #[arg(long, short, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one transformation run
    #[command(name = "run", about = "Execute one run over the given input files")]
    Run(RunArgs),

    /// Print a warehouse table
    #[command(name = "show", about = "Print a Silver or Gold table as JSON")]
    Show(ShowArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = MedallionConfig::load(cli.config.clone())?;
    init_tracing(cli.verbose, &config.observability);

    match cli.command {
        Commands::Run(args) => args.execute(config).await,
        Commands::Show(args) => args.execute(config).await,
    }
}

fn init_tracing(verbose: bool, observability: &ObservabilityConfig) {
    let filter = if verbose {
        EnvFilter::new("medallion_processor=debug,medallion_cli=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(observability.log_level.as_str()))
    };

    // stdout carries table and report output
    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);
    if observability.json_logging {
        registry.with(layer.json()).init();
    } else {
        registry.with(layer).init();
    }
}
