//! Agent Queue CLI - drive and inspect the per-user admission queue

mod logging;
mod settings;
mod simulate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use settings::{LogFormat, Settings};
use simulate::SimulateArgs;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "agent-queue")]
#[command(about = "Per-user admission control and queueing for agent requests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML). Defaults to <config dir>/agent-queue/config.toml
    #[arg(long, global = true, env = "AGENT_QUEUE_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, env = "AGENT_QUEUE_LOG_FORMAT", value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run synthetic users against one queue manager and print a summary
    Simulate(SimulateArgs),

    /// Print the effective settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(format) = cli.log_format {
        settings.log.format = format;
    }

    logging::init(&settings.log)?;
    info!("Agent Queue v{} starting...", agent_queue_core::VERSION);

    match cli.command {
        Commands::Simulate(args) => simulate::run(&settings, args).await?,

        Commands::Config => {
            println!("{}", "Effective settings".cyan().bold());
            println!();

            match cli.config.or_else(settings::default_config_path) {
                Some(path) if path.exists() => {
                    println!("  {} {}", "File:".bold(), path.display())
                }
                Some(path) => println!(
                    "  {} {} {}",
                    "File:".bold(),
                    path.display(),
                    "(not found, using defaults)".yellow()
                ),
                None => println!("  {} {}", "File:".bold(), "none".yellow()),
            }
            println!();

            let rendered =
                serde_json::to_string_pretty(&settings).context("Failed to render settings")?;
            println!("{}", rendered);
        }
    }

    Ok(())
}
