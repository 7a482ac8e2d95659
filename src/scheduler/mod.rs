//! Activation scheduling
//!
//! Both strategies drive the same turn: tick the particle's clock and, if
//! it fired, run one activation against the node store. Every turn emits
//! one `ActivationRecord`.

pub mod concurrent;
pub mod lock;
pub mod sequential;
pub mod shared;

use ahash::AHashMap;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::compression::{activate, Algorithm, CompressionVariant, MoveOutcome, StepReport};
use crate::core::error::{Result, SimError};
use crate::core::types::ParticleId;
use crate::graph::NodeStore;
use crate::particle::{Activation, Particle};

pub use concurrent::{run_concurrent, ConcurrentRun};
pub use lock::{HoldInterval, HoldRecorder, RegionGuard, RegionLock};
pub use sequential::run_sequential;
pub use shared::SharedEnvironment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Concurrent,
}

/// Knobs shared by both strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerSettings {
    pub algorithm: Algorithm,
    pub variant: CompressionVariant,
    /// Sequential mode: full passes over the particle table
    pub rounds: u32,
    /// Concurrent mode: total turns across all workers
    pub activation_budget: u64,
    pub workers: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Compress,
            variant: CompressionVariant::Asynchronous,
            rounds: 100,
            activation_budget: 10_000,
            workers: 4,
        }
    }
}

/// Turn and outcome tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub turns: u64,
    pub activations: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub blocked: u64,
}

impl RunCounters {
    pub fn observe(&mut self, outcome: MoveOutcome) {
        self.turns += 1;
        match outcome {
            MoveOutcome::Idle => return,
            MoveOutcome::Blocked => self.blocked += 1,
            MoveOutcome::Moved => self.accepted += 1,
            MoveOutcome::Reverted => self.rejected += 1,
        }
        self.activations += 1;
    }

    pub fn merge(&mut self, other: &RunCounters) {
        self.turns += other.turns;
        self.activations += other.activations;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
        self.blocked += other.blocked;
    }
}

/// One scheduler turn for one particle
pub fn take_turn<S: NodeStore>(particle: &mut Particle, store: &mut S, settings: &SchedulerSettings) -> Result<StepReport> {
    match particle.tick() {
        Activation::Eligible => activate(particle, store, settings.algorithm, settings.variant),
        Activation::NotYet => Ok(StepReport::idle()),
    }
}

/// Check that every particle occupies exactly its own node(s)
///
/// Any node owned by an unknown particle, or a particle spread over the
/// wrong number of nodes, is an invariant violation.
pub fn audit<S: NodeStore>(store: &S, particles: &[Particle]) -> Result<()> {
    let mut footprint: AHashMap<ParticleId, usize> = AHashMap::new();
    for handle in store.handles() {
        if !store.occupancy(handle).is_particle() {
            continue;
        }
        let owner = store.occupant(handle).ok_or_else(|| {
            SimError::InvariantViolation(format!("{} is occupied without an owner", store.coord(handle)))
        })?;
        *footprint.entry(owner).or_default() += 1;
    }

    for particle in particles {
        let expected = if particle.is_contracted() { 1 } else { 2 };
        let found = footprint.remove(&particle.id()).unwrap_or(0);
        if found != expected {
            return Err(SimError::InvariantViolation(format!(
                "{} occupies {} nodes, expected {}",
                particle.id(),
                found,
                expected
            )));
        }
        particle.locate(store)?;
    }

    if let Some(stray) = footprint.keys().next() {
        return Err(SimError::InvariantViolation(format!("{} owns nodes but is not scheduled", stray)));
    }
    Ok(())
}
