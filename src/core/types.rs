//! Core type definitions used throughout the codebase

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Opaque particle identifier
///
/// Particles are anonymous to each other: only the scheduler, the audit pass
/// and the state tracker read this value. Movement decisions look at node
/// occupancy codes only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[display(fmt = "particle#{}", _0)]
pub struct ParticleId(u32);

impl ParticleId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Position of this particle in the scheduler's particle table
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Arena handle for a materialized lattice node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display(fmt = "node#{}", _0)]
pub struct NodeHandle(usize);

impl NodeHandle {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Scheduler turn counter (one turn = one particle tick)
pub type Tick = u64;

/// Value of a particle's activation clock
pub type ClockValue = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_id_equality() {
        let a = ParticleId::new(1);
        let b = ParticleId::new(1);
        let c = ParticleId::new(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_particle_id_hash() {
        use std::collections::HashMap;
        let mut map: HashMap<ParticleId, &str> = HashMap::new();
        map.insert(ParticleId::new(3), "blob");
        assert_eq!(map.get(&ParticleId::new(3)), Some(&"blob"));
    }

    #[test]
    fn test_particle_id_display() {
        assert_eq!(ParticleId::new(7).to_string(), "particle#7");
        assert_eq!(NodeHandle::new(4).to_string(), "node#4");
    }

    #[test]
    fn test_particle_id_index() {
        assert_eq!(ParticleId::new(12).index(), 12);
        assert_eq!(ParticleId::new(12).raw(), 12);
    }
}
