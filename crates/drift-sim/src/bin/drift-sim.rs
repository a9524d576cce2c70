//! drift-sim: run N Lamport-clock nodes on localhost and write one event log per node.
//!
//! ```text
//! drift-sim --nodes 3 --duration 60 --log-dir ./logs
//! drift-sim --nodes 5 --seed 42 --weights 1,1,1,7
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use drift_runtime::{ActionWeights, DEFAULT_BASE_PORT};
use drift_sim::{Simulation, SimulationConfig};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "drift-sim")]
#[command(about = "Simulate logical clock drift between asynchronous nodes")]
struct Args {
    /// Number of nodes
    #[arg(short, long, default_value_t = 3)]
    nodes: u64,

    /// Host every node binds to
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Node n listens on base-port + n
    #[arg(long, default_value_t = DEFAULT_BASE_PORT)]
    base_port: u16,

    /// Lowest tick rate, ticks per second
    #[arg(long, default_value_t = 1)]
    min_tick_rate: u32,

    /// Highest tick rate, ticks per second
    #[arg(long, default_value_t = 6)]
    max_tick_rate: u32,

    /// Run duration in seconds
    #[arg(short, long, default_value_t = 60)]
    duration: u64,

    /// Directory for machine_<id>.log files
    #[arg(long, default_value = ".")]
    log_dir: PathBuf,

    /// Seed for tick rates and action choices
    #[arg(long)]
    seed: Option<u64>,

    /// Action weights: send-first,send-second,broadcast,internal
    #[arg(long, default_value_t = ActionWeights::default())]
    weights: ActionWeights,

    /// Console log format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_format);

    let mut config = SimulationConfig {
        nodes: args.nodes,
        host: args.host,
        base_port: args.base_port,
        ..SimulationConfig::default()
    }
    .with_tick_rates(args.min_tick_rate, args.max_tick_rate)
    .with_duration(Duration::from_secs(args.duration))
    .with_log_dir(args.log_dir)
    .with_weights(args.weights);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let report = match Simulation::new(config).and_then(Simulation::run) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("simulation did not start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for node in report.reports() {
        tracing::info!(
            node = %node.id,
            ticks = node.ticks,
            final_clock = node.final_clock,
            sends = node.sends,
            receives = node.receives,
            internals = node.internals,
            "node summary"
        );
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
