//! Amoebot Sim - command line runner
//!
//! Loads a run configuration (defaults, then an optional TOML file, then
//! flags), runs the simulation and prints the result.

use std::fs;
use std::path::PathBuf;

use amoebot_sim::compression::{Algorithm, CompressionVariant};
use amoebot_sim::core::error::Result;
use amoebot_sim::scheduler::ExecutionMode;
use amoebot_sim::{simulate, RunConfig};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Amoebot compression simulator
#[derive(Parser, Debug)]
#[command(name = "amoebot-sim")]
#[command(about = "Simulate local compression of amoebot particles on a triangular lattice")]
struct Args {
    /// TOML run configuration; flags below override it
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Lattice points per row
    #[arg(long)]
    width: Option<i64>,

    /// Lattice rows
    #[arg(long)]
    height: Option<i64>,

    /// Number of randomly placed particles
    #[arg(long, short = 'n')]
    particles: Option<usize>,

    /// JSON placement file with particles and walls
    #[arg(long)]
    placement: Option<PathBuf>,

    /// Execution mode
    #[arg(long, value_enum)]
    mode: Option<ExecutionMode>,

    /// Compression variant
    #[arg(long, value_enum)]
    variant: Option<CompressionVariant>,

    /// Movement rule
    #[arg(long, value_enum)]
    algorithm: Option<Algorithm>,

    /// Concurrent workers
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Sequential rounds
    #[arg(long)]
    rounds: Option<u32>,

    /// Concurrent activation budget
    #[arg(long)]
    budget: Option<u64>,

    /// Metropolis bias parameter
    #[arg(long)]
    tau0: Option<f64>,

    /// Mean of the activation clock
    #[arg(long)]
    mu: Option<f64>,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for per-activation track files
    #[arg(long)]
    track_dir: Option<PathBuf>,

    /// Skip the post-run footprint audit
    #[arg(long)]
    no_audit: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the output here instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

fn build_config(args: &Args) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_toml_file(path)?,
        None => RunConfig::default(),
    };

    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(particles) = args.particles {
        config.particles = particles;
    }
    if let Some(placement) = &args.placement {
        config.placement = Some(placement.clone());
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(variant) = args.variant {
        config.variant = variant;
    }
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(rounds) = args.rounds {
        config.rounds = rounds;
    }
    if let Some(budget) = args.budget {
        config.activation_budget = budget;
    }
    if let Some(tau0) = args.tau0 {
        config.tau0 = tau0;
    }
    if let Some(mu) = args.mu {
        config.mu = mu;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(dir) = &args.track_dir {
        config.track_dir = Some(dir.clone());
    }
    if args.no_audit {
        config.audit = false;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("amoebot_sim=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = build_config(&args)?;
    tracing::info!(mode = ?config.mode, seed = config.seed, "Amoebot Sim starting...");

    let output = match simulate(&config) {
        Ok(output) => output,
        Err(e) => {
            if e.is_configuration() {
                tracing::error!(error = %e, "Configuration rejected");
            } else {
                tracing::error!(error = %e, "Run aborted");
            }
            return Err(e);
        }
    };

    let rendered = match args.format {
        OutputFormat::Json => output.to_json(),
        OutputFormat::Text => output.summary(),
    };
    match &args.output {
        Some(path) => fs::write(path, rendered)?,
        None => println!("{}", rendered),
    }
    Ok(())
}
