//! # escrow-cli Entry Point
//!
//! Runs scripted escrow sessions against an in-memory ledger.

mod script;

use anyhow::Context;
use clap::Parser;
use escrow_lifecycle::EscrowManagerConfig;
use std::path::PathBuf;

/// Escrow lifecycle driver.
#[derive(Parser, Debug)]
#[command(name = "escrow-cli", version, about)]
struct Cli {
    /// Configuration file; `ESCROW_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Execute a JSON script and print one JSON line per step.
    Run {
        /// Path to the script file.
        #[arg(long)]
        script: PathBuf,
    },
    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EscrowManagerConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Run { script: path } => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let script: script::Script =
                serde_json::from_str(&raw).context("failed to parse script")?;

            tracing::info!(steps = script.steps.len(), "Running escrow script");

            let session = script::Session::new(config, &script)
                .await
                .context("failed to seed ledger balances")?;
            for report in session.run(&script.steps).await {
                println!("{}", serde_json::to_string(&report)?);
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
