use clap::Parser;

/// Run a dependency-ordered set of demo services on a turn loop.
///
/// Service n°1 waits for n°2, n°2 for n°3, and so on; the last one starts
/// right away. The run prints returns, elapsed times and reports as JSON.
#[derive(Parser, Debug)]
#[command(name = "turnloop", about = "Cooperative turn loop demo runner")]
pub struct CliArgs {
    /// Path to a TOML config file
    #[arg(long, env = "TURNLOOP_CONFIG")]
    pub config: Option<String>,

    /// Record a report for every task after each turn
    #[arg(long)]
    pub debug: bool,

    /// Route panics raised during a turn to the task's error strategy
    #[arg(long)]
    pub handle_errors: bool,

    /// Turn limit of every deferred task
    #[arg(long)]
    pub limit: Option<u32>,

    /// Drop tasks that reach their limit instead of failing the run
    #[arg(long)]
    pub abort_on_limit: bool,

    /// Number of chained services
    #[arg(long)]
    pub tasks: Option<usize>,

    /// Seconds the last service waits before registering
    #[arg(long)]
    pub wait: Option<f64>,

    /// Also defer a task that panics (pair with --handle-errors)
    #[arg(long)]
    pub faulty: bool,
}
