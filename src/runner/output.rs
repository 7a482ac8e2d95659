//! Run output and serialization

use std::time::Duration;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::ParticleId;
use crate::lattice::Coord;
use crate::particle::{Particle, ParticleSnapshot};
use crate::scheduler::{ExecutionMode, RunCounters};

/// Complete run output
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub particles: Vec<ParticleSnapshot>,
    pub statistics: RunStats,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunStats {
    pub mode: ExecutionMode,
    pub particles: usize,
    pub turns: u64,
    pub activations: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub blocked: u64,
    pub elapsed_ms: u64,
    /// Lattice edges between nodes of different particles
    pub initial_edges: usize,
    pub final_edges: usize,
}

impl SimulationOutput {
    pub fn new(
        mode: ExecutionMode,
        particles: &[Particle],
        counters: RunCounters,
        initial_edges: usize,
        elapsed: Duration,
    ) -> Self {
        Self {
            particles: particles.iter().map(Particle::snapshot).collect(),
            statistics: RunStats {
                mode,
                particles: particles.len(),
                turns: counters.turns,
                activations: counters.activations,
                accepted: counters.accepted,
                rejected: counters.rejected,
                blocked: counters.blocked,
                elapsed_ms: elapsed.as_millis() as u64,
                initial_edges,
                final_edges: count_particle_edges(particles),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn summary(&self) -> String {
        let stats = &self.statistics;
        format!(
            "{:?} run: {} particles, {} turns in {}ms\n{} activations: {} moved, {} reverted, {} blocked\nparticle edges {} -> {}",
            stats.mode,
            stats.particles,
            stats.turns,
            stats.elapsed_ms,
            stats.activations,
            stats.accepted,
            stats.rejected,
            stats.blocked,
            stats.initial_edges,
            stats.final_edges,
        )
    }
}

/// Count lattice edges joining nodes held by different particles
///
/// For contracted systems this is the edge count the compression chain
/// maximizes.
pub fn count_particle_edges(particles: &[Particle]) -> usize {
    let mut owners: AHashMap<Coord, ParticleId> = AHashMap::new();
    for particle in particles {
        owners.insert(particle.head(), particle.id());
        owners.insert(particle.tail(), particle.id());
    }

    let owners = &owners;
    let ends = owners
        .iter()
        .flat_map(|(coord, id)| {
            coord
                .neighbors()
                .into_iter()
                .filter(move |n| owners.get(n).is_some_and(|other| other != id))
        })
        .count();
    ends / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleParams;

    fn particle(id: u32, head: (i32, i32), tail: (i32, i32)) -> Particle {
        Particle::new(ParticleId::new(id), head.into(), tail.into(), ParticleParams::default(), 0).unwrap()
    }

    #[test]
    fn test_edges_of_triangle() {
        let particles = [particle(0, (0, 0), (0, 0)), particle(1, (2, 0), (2, 0)), particle(2, (1, 1), (1, 1))];
        assert_eq!(count_particle_edges(&particles), 3);
    }

    #[test]
    fn test_edges_ignore_own_nodes() {
        let particles = [particle(0, (2, 0), (0, 0))];
        assert_eq!(count_particle_edges(&particles), 0);

        let particles = [particle(0, (2, 0), (0, 0)), particle(1, (1, 1), (1, 1))];
        assert_eq!(count_particle_edges(&particles), 2);
    }

    #[test]
    fn test_summary_and_json() {
        let particles = [particle(0, (0, 0), (0, 0)), particle(1, (2, 0), (2, 0))];
        let counters = RunCounters {
            turns: 10,
            activations: 6,
            accepted: 2,
            rejected: 3,
            blocked: 1,
        };
        let output = SimulationOutput::new(ExecutionMode::Sequential, &particles, counters, 1, Duration::from_millis(12));

        let summary = output.summary();
        assert!(summary.contains("2 particles"));
        assert!(summary.contains("2 moved, 3 reverted, 1 blocked"));

        let json: serde_json::Value = serde_json::from_str(&output.to_json()).unwrap();
        assert_eq!(json["statistics"]["final_edges"], 1);
        assert_eq!(json["statistics"]["mode"], "sequential");
        assert_eq!(json["particles"][1]["head"], serde_json::json!([2, 0]));
    }
}
