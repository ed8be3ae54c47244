mod cli;
mod simulate;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{error, info};

use keylane_core::SchedulerConfig;

use crate::cli::{CliArgs, Command};

fn main() -> Result<()> {
    keylane_core::load_dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    match args.command {
        Command::Simulate(sim) => {
            info!(
                "Simulating {} tasks over {} keys ({} dispatch)",
                sim.tasks, sim.keys, sim.strategy
            );
            let report = simulate::run(&sim)?;
            simulate::print_report(&report, sim.json)?;
            if report.overlaps > 0 {
                error!("{} same-key executions overlapped", report.overlaps);
                bail!("per-key exclusion violated");
            }
        }
        Command::Config => {
            let config = SchedulerConfig::from_env()?;
            config.log_summary();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
