//! netshed command - create and delete declared host networks.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use netshed::{Config, InterfaceManager, MasqueradeManager, Orchestrator};

#[derive(Parser)]
#[command(name = "netshed", version, about = "Provision bridge and dummy networks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create every network in the config file.
    Create(ConfigArgs),

    /// Delete every network in the config file.
    Delete(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to the network configuration (YAML, or JSON with a .json extension).
    #[arg(short, long, value_name = "PATH")]
    config: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Create(args) => {
            let config = Config::load(&args.config)?;
            let report = orchestrator()?.create(&config.networks).await?;
            tracing::debug!(networks = report.processed.len(), "create finished");
        }
        Command::Delete(args) => {
            let config = Config::load(&args.config)?;
            let report = orchestrator()?.delete(&config.networks).await?;
            if !report.is_clean() {
                tracing::warn!(
                    failed = report.warnings.len(),
                    "some masquerade rules could not be removed"
                );
            }
            tracing::debug!(networks = report.processed.len(), "delete finished");
        }
    }

    Ok(())
}

fn orchestrator() -> anyhow::Result<Orchestrator<InterfaceManager, MasqueradeManager>> {
    let interfaces = InterfaceManager::new().context("failed to initialize interface manager")?;
    let masquerade = MasqueradeManager::new().context("failed to initialize nftables")?;
    Ok(Orchestrator::new(interfaces, masquerade))
}
