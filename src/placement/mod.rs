//! Initial particle and wall configuration
//!
//! Placements are plain JSON:
//!
//! ```json
//! { "particles": [{ "head": [0, 0], "tail": [2, 0] }], "walls": [[4, 0]] }
//! ```
//!
//! A missing `tail` means the particle starts contracted.

use std::fs;
use std::path::Path;

use ahash::AHashSet;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{PlacementError, Result, SimError};
use crate::core::types::ParticleId;
use crate::graph::NodeStore;
use crate::lattice::{Coord, TriangularLattice};
use crate::particle::{Particle, ParticleParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticlePlacement {
    pub head: Coord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail: Option<Coord>,
}

impl ParticlePlacement {
    pub fn contracted(at: Coord) -> Self {
        Self { head: at, tail: None }
    }

    pub fn expanded(head: Coord, tail: Coord) -> Self {
        Self { head, tail: Some(tail) }
    }

    pub fn tail(&self) -> Coord {
        self.tail.unwrap_or(self.head)
    }

    /// Nodes this particle covers, head first
    pub fn nodes(&self) -> Vec<Coord> {
        match self.tail {
            Some(tail) if tail != self.head => vec![self.head, tail],
            _ => vec![self.head],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub particles: Vec<ParticlePlacement>,
    #[serde(default)]
    pub walls: Vec<Coord>,
}

impl Placement {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SimError::InvalidPlacement(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let placement = Self::from_json_str(&fs::read_to_string(path)?)?;
        debug!(path = %path.display(), particles = placement.particles.len(), "Loaded placement");
        Ok(placement)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// `count` contracted particles on distinct lattice points, skipping `avoid`
    pub fn random<R: Rng + ?Sized>(
        lattice: &TriangularLattice,
        count: usize,
        avoid: &[Coord],
        rng: &mut R,
    ) -> Result<Self> {
        let points: Vec<Coord> = lattice.points().filter(|p| !avoid.contains(p)).collect();
        if count > points.len() {
            return Err(SimError::InvalidPlacement(format!(
                "{} particles do not fit on {} lattice points",
                count,
                points.len()
            )));
        }
        let particles = points
            .choose_multiple(rng, count)
            .map(|at| ParticlePlacement::contracted(*at))
            .collect();
        Ok(Self { particles, walls: Vec::new() })
    }

    pub fn with_walls(mut self, walls: impl IntoIterator<Item = Coord>) -> Self {
        self.walls.extend(walls);
        self
    }

    /// Structural checks that need no node store
    pub fn validate(&self) -> Result<()> {
        let mut seen = AHashSet::new();
        for particle in &self.particles {
            let tail = particle.tail();
            if tail != particle.head && !particle.head.is_adjacent(&tail) {
                return Err(PlacementError::NotAdjacent {
                    head: particle.head,
                    tail,
                }
                .into());
            }
            for node in particle.nodes() {
                if !seen.insert(node) {
                    return Err(PlacementError::Duplicate(node).into());
                }
            }
        }
        Ok(())
    }

    /// Reject coordinates that are not points of `lattice`'s grid
    ///
    /// Points off the lattice rectangle are fine (the graph grows on
    /// demand), but a point of the wrong `x + y` parity would sit on a
    /// parallel lattice with no link to any other node.
    pub fn check_lattice(&self, lattice: &TriangularLattice) -> Result<()> {
        let nodes = self.particles.iter().flat_map(ParticlePlacement::nodes);
        for coord in nodes.chain(self.walls.iter().copied()) {
            if !coord.same_lattice(&lattice.origin) {
                return Err(SimError::InvalidPlacement(format!(
                    "{} is not a point of the lattice anchored at {}",
                    coord, lattice.origin
                )));
            }
        }
        Ok(())
    }

    /// Put walls then particles on `store`
    ///
    /// Particle ids follow list order. Any refusal is a configuration
    /// error; the store may hold a partial placement afterwards.
    pub fn apply<S: NodeStore>(&self, store: &mut S, params: ParticleParams, seed: u64) -> Result<Vec<Particle>> {
        self.validate()?;
        for wall in &self.walls {
            store.add_wall(*wall)?;
        }

        let mut particles = Vec::with_capacity(self.particles.len());
        for (index, entry) in self.particles.iter().enumerate() {
            let id = ParticleId::new(index as u32);
            let particle = Particle::new(id, entry.head, entry.tail(), params, seed)?;
            if let Err(e) = particle.place_on(store) {
                warn!(particle = %id, error = %e, "Placement rejected");
                return Err(e.into());
            }
            particles.push(particle);
        }
        Ok(particles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeGraph, Occupancy};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_parse_json_document() {
        let json = r#"{
            "particles": [{ "head": [0, 0], "tail": [2, 0] }, { "head": [1, 1] }],
            "walls": [[4, 0]]
        }"#;
        let placement = Placement::from_json_str(json).unwrap();
        assert_eq!(placement.particles[0], ParticlePlacement::expanded(Coord::new(0, 0), Coord::new(2, 0)));
        assert_eq!(placement.particles[1].tail(), Coord::new(1, 1));
        assert_eq!(placement.walls, vec![Coord::new(4, 0)]);
    }

    #[test]
    fn test_malformed_json_is_configuration_error() {
        let err = Placement::from_json_str(r#"{ "particles": [{ "head": [0] }] }"#).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("placement.json");
        let placement = Placement {
            particles: vec![ParticlePlacement::contracted(Coord::new(2, 0))],
            walls: vec![Coord::new(0, 0)],
        };
        placement.save(&path).unwrap();
        assert_eq!(Placement::load(&path).unwrap(), placement);
    }

    #[test]
    fn test_validate_catches_overlap_and_gaps() {
        let overlap = Placement {
            particles: vec![
                ParticlePlacement::expanded(Coord::new(0, 0), Coord::new(2, 0)),
                ParticlePlacement::contracted(Coord::new(2, 0)),
            ],
            walls: Vec::new(),
        };
        assert!(matches!(
            overlap.validate(),
            Err(SimError::Placement(PlacementError::Duplicate(_)))
        ));

        let gap = Placement {
            particles: vec![ParticlePlacement::expanded(Coord::new(0, 0), Coord::new(4, 0))],
            walls: Vec::new(),
        };
        assert!(gap.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_random_placement_is_distinct() {
        let lattice = TriangularLattice::new(5, 5).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let avoid = [Coord::new(0, 0), Coord::new(2, 0)];
        let placement = Placement::random(&lattice, 12, &avoid, &mut rng).unwrap();
        assert_eq!(placement.particles.len(), 12);
        placement.validate().unwrap();
        assert!(placement.particles.iter().all(|p| lattice.contains(&p.head)));
        assert!(placement.particles.iter().all(|p| !avoid.contains(&p.head)));

        assert!(Placement::random(&lattice, 24, &avoid, &mut rng).is_err());
        assert!(Placement::random(&lattice, 23, &avoid, &mut rng).is_ok());
    }

    #[test]
    fn test_apply_places_walls_and_particles() {
        let lattice = TriangularLattice::new(4, 4).unwrap();
        let mut graph = NodeGraph::from_lattice(&lattice);
        let placement = Placement {
            particles: vec![ParticlePlacement::expanded(Coord::new(2, 0), Coord::new(0, 0))],
            walls: vec![Coord::new(4, 0)],
        };
        let particles = placement.apply(&mut graph, ParticleParams::default(), 1).unwrap();
        assert_eq!(particles.len(), 1);

        let wall = graph.handle_of(Coord::new(4, 0)).unwrap();
        assert_eq!(graph.occupancy(wall), Occupancy::Wall);
        let head = graph.handle_of(Coord::new(2, 0)).unwrap();
        assert_eq!(graph.occupancy(head), Occupancy::ExpandedHead);
    }

    #[test]
    fn test_check_lattice_rejects_wrong_parity() {
        let lattice = TriangularLattice::new(4, 4).unwrap();
        let on_grid = Placement {
            particles: vec![
                ParticlePlacement::contracted(Coord::new(0, 0)),
                ParticlePlacement::expanded(Coord::new(-1, -1), Coord::new(-3, -1)),
            ],
            walls: vec![Coord::new(40, 2)],
        };
        assert!(on_grid.check_lattice(&lattice).is_ok());

        let particle_off = Placement {
            particles: vec![ParticlePlacement::contracted(Coord::new(1, 0))],
            walls: Vec::new(),
        };
        let err = particle_off.check_lattice(&lattice).unwrap_err();
        assert!(matches!(err, SimError::InvalidPlacement(_)));

        let wall_off = Placement {
            particles: Vec::new(),
            walls: vec![Coord::new(2, 1)],
        };
        assert!(wall_off.check_lattice(&lattice).unwrap_err().is_configuration());

        let shifted = TriangularLattice::with_origin(4, 4, Coord::new(1, 0)).unwrap();
        assert!(particle_off.check_lattice(&shifted).is_ok());
    }

    #[test]
    fn test_head_on_wall_is_configuration_error() {
        let mut graph = NodeGraph::from_lattice(&TriangularLattice::new(4, 4).unwrap());
        let placement = Placement {
            particles: vec![ParticlePlacement::contracted(Coord::new(2, 0))],
            walls: vec![Coord::new(2, 0)],
        };
        let err = placement.apply(&mut graph, ParticleParams::default(), 1).unwrap_err();
        assert!(err.is_configuration());
        assert!(!err.is_invariant_violation());
    }
}
