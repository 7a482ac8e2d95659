//! End-to-end run: build the lattice, place particles, schedule, audit

pub mod output;

use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};

use crate::core::config::RunConfig;
use crate::core::error::Result;
use crate::graph::{NodeEnvironment, NodeGraph};
use crate::lattice::TriangularLattice;
use crate::particle::{Particle, ParticleSnapshot};
use crate::placement::Placement;
use crate::scheduler::{audit, run_concurrent, run_sequential, ExecutionMode};
use crate::tracker::{JsonTracker, NullTracker, StateTracker};

pub use output::{count_particle_edges, RunStats, SimulationOutput};

/// Validated lattice with every particle placed
pub struct Setup {
    pub lattice: TriangularLattice,
    pub graph: NodeGraph,
    pub particles: Vec<Particle>,
}

impl Setup {
    pub fn snapshots(&self) -> Vec<ParticleSnapshot> {
        self.particles.iter().map(Particle::snapshot).collect()
    }
}

/// Build the initial configuration
///
/// Every failure here is a configuration error; nothing has moved yet.
pub fn prepare(config: &RunConfig) -> Result<Setup> {
    if let Err(e) = config.validate() {
        warn!(error = %e, "Rejected run configuration");
        return Err(e);
    }

    let lattice = TriangularLattice::with_origin(config.width, config.height, config.origin)?;
    let mut graph = NodeGraph::from_lattice(&lattice);

    let placement = match &config.placement {
        Some(path) => Placement::load(path)?,
        None => {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            Placement::random(&lattice, config.particles, &config.walls, &mut rng)?
        }
    }
    .with_walls(config.walls.iter().copied());
    placement.check_lattice(&lattice)?;

    let particles = placement.apply(&mut graph, config.particle_params(), config.seed)?;
    info!(
        width = config.width,
        height = config.height,
        particles = particles.len(),
        walls = placement.walls.len(),
        "Initial configuration placed"
    );

    Ok(Setup {
        lattice,
        graph,
        particles,
    })
}

/// Run a prepared setup, reporting every turn to `tracker`
pub fn execute<T: StateTracker + 'static>(config: &RunConfig, setup: Setup, mut tracker: T) -> Result<(SimulationOutput, T)> {
    let start = Instant::now();
    let settings = config.scheduler_settings();
    let initial_edges = count_particle_edges(&setup.particles);

    let (particles, counters, tracker) = match config.mode {
        ExecutionMode::Sequential => {
            let Setup {
                mut graph,
                mut particles,
                ..
            } = setup;
            let counters = run_sequential(&mut graph, &mut particles, &settings, &mut tracker)?;
            if config.audit {
                audit(&graph, &particles)?;
            }
            (particles, counters, tracker)
        }
        ExecutionMode::Concurrent => {
            let environment = NodeEnvironment::from_graph(&setup.graph);
            let run = run_concurrent(environment, setup.particles, &settings, tracker, None)?;
            if config.audit {
                audit(&run.environment, &run.particles)?;
            }
            (run.particles, run.counters, run.tracker)
        }
    };

    let output = SimulationOutput::new(config.mode, &particles, counters, initial_edges, start.elapsed());
    info!(
        turns = output.statistics.turns,
        edges = output.statistics.final_edges,
        elapsed_ms = output.statistics.elapsed_ms,
        "Run complete"
    );
    Ok((output, tracker))
}

/// Run the simulation described by `config`
///
/// Tracks to `config.track_dir` when set.
pub fn simulate(config: &RunConfig) -> Result<SimulationOutput> {
    let setup = prepare(config)?;
    let tracker: Box<dyn StateTracker> = match &config.track_dir {
        Some(dir) => Box::new(JsonTracker::create(dir, &setup.snapshots())?),
        None => Box::new(NullTracker),
    };
    let (output, _) = execute(config, setup, tracker)?;
    Ok(output)
}
