use clap::{Args, Parser, Subcommand};

use keylane_core::DispatchStrategy;

/// Keyed task scheduler driver.
///
/// Runs synthetic keyed workloads through the scheduler and checks that
/// tasks sharing a key never overlapped.
#[derive(Parser, Debug)]
#[command(name = "keylane", version, about = "Keyed task scheduler driver")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a synthetic workload and report concurrency per key
    Simulate(SimulateArgs),
    /// Print the scheduler config resolved from the environment
    Config,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Number of tasks to submit
    #[arg(long, default_value_t = 15)]
    pub tasks: usize,

    /// Number of distinct keys the tasks are spread over
    #[arg(long, default_value_t = 2)]
    pub keys: usize,

    /// Worker pool size (default: host parallelism)
    #[arg(long, env = "KEYLANE_WORKER_THREADS")]
    pub workers: Option<usize>,

    /// Dispatch strategy: notify, poll or lanes
    #[arg(long, env = "KEYLANE_STRATEGY", default_value = "notify", value_parser = parse_strategy)]
    pub strategy: DispatchStrategy,

    /// Dispatcher poll interval in milliseconds (poll strategy only)
    #[arg(long, env = "KEYLANE_POLL_INTERVAL_MS", default_value_t = 20)]
    pub poll_interval_ms: u64,

    /// Upper bound on each task's simulated work, in milliseconds
    #[arg(long, default_value_t = 200)]
    pub max_sleep_ms: u64,

    /// Make every Nth task fail
    #[arg(long)]
    pub fail_every: Option<usize>,

    /// Seed for the simulated work durations
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_strategy(s: &str) -> Result<DispatchStrategy, String> {
    s.parse().map_err(|e: keylane_core::SchedulerError| e.to_string())
}
