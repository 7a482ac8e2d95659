//! Lock-step rounds over the particle table

use tracing::{debug, info};

use crate::core::error::Result;
use crate::graph::NodeStore;
use crate::particle::Particle;
use crate::scheduler::{take_turn, RunCounters, SchedulerSettings};
use crate::tracker::{ActivationRecord, StateTracker};

/// Run `settings.rounds` passes over `particles` in index order
///
/// Deterministic for a fixed seed since every particle draws from its own
/// generator.
pub fn run_sequential<S: NodeStore, T: StateTracker + ?Sized>(
    store: &mut S,
    particles: &mut [Particle],
    settings: &SchedulerSettings,
    tracker: &mut T,
) -> Result<RunCounters> {
    info!(
        rounds = settings.rounds,
        particles = particles.len(),
        algorithm = ?settings.algorithm,
        variant = ?settings.variant,
        "Starting sequential run"
    );

    let mut counters = RunCounters::default();
    for round in 0..settings.rounds {
        for particle in particles.iter_mut() {
            let report = take_turn(particle, store, settings)?;
            tracker.record(&ActivationRecord::new(counters.turns, particle.snapshot(), report.outcome))?;
            counters.observe(report.outcome);
        }
        if round % 100 == 0 {
            debug!(round, accepted = counters.accepted, "Round complete");
        }
    }

    tracker.finish()?;
    info!(turns = counters.turns, accepted = counters.accepted, "Sequential run finished");
    Ok(counters)
}
