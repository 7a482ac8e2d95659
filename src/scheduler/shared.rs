//! Node environment shared by the worker pool
//!
//! The table sits behind an `RwLock`. Workers hold it for reading while they
//! act; only materializing a missing node takes it for writing. Under the
//! read lock a worker locks the region around its particle, copies those
//! cells into a small `NodeGraph`, runs the activation there and writes back
//! the cells that changed.
//!
//! An activation never looks further than `REGION_RADIUS` hops from the
//! particle's tail: the head is one hop out and the gates read the
//! neighbors of both. Workers whose regions are disjoint run in parallel.

use std::sync::{Arc, RwLock, RwLockReadGuard};

use tracing::{debug, trace};

use crate::compression::{activate, Algorithm, CompressionVariant, StepReport};
use crate::core::error::{Result, SimError};
use crate::core::types::NodeHandle;
use crate::graph::{NodeEnvironment, NodeGraph, NodeStore};
use crate::lattice::Coord;
use crate::particle::Particle;
use crate::scheduler::lock::{HoldRecorder, RegionLock, DEFAULT_STRIPES};

/// Hops from the tail an activation may read or write
pub const REGION_RADIUS: u32 = 2;

pub struct SharedEnvironment {
    table: RwLock<NodeEnvironment>,
    regions: RegionLock,
}

impl SharedEnvironment {
    pub fn new(environment: NodeEnvironment, recorder: Option<Arc<HoldRecorder>>) -> Self {
        let regions = match recorder {
            Some(recorder) => RegionLock::with_recorder(DEFAULT_STRIPES, recorder),
            None => RegionLock::new(DEFAULT_STRIPES),
        };
        Self {
            table: RwLock::new(environment),
            regions,
        }
    }

    pub fn into_inner(self) -> Result<NodeEnvironment> {
        self.table.into_inner().map_err(|_| SimError::LockPoisoned)
    }

    /// Materialized nodes in the table
    pub fn node_count(&self) -> Result<usize> {
        Ok(self.table.read().map_err(|_| SimError::LockPoisoned)?.len())
    }

    /// Run one activation of `particle` with its region locked
    pub fn activate(
        &self,
        particle: &mut Particle,
        algorithm: Algorithm,
        variant: CompressionVariant,
    ) -> Result<StepReport> {
        let coords = particle.tail().ball(REGION_RADIUS);
        let (table, handles) = self.read_region(&coords)?;
        let _region = self.regions.acquire(&handles)?;

        let mut local = NodeGraph::new();
        let mut cells = Vec::with_capacity(coords.len());
        for (coord, shared) in coords.iter().zip(&handles) {
            let (occupancy, occupant) = table.cell(*shared);
            let own = local.materialize(*coord);
            local.set_cell(own, occupancy, occupant);
            cells.push((own, *shared, (occupancy, occupant)));
        }

        let report = activate(particle, &mut local, algorithm, variant)?;
        if local.len() != coords.len() {
            return Err(SimError::InvariantViolation(format!(
                "{} reached {} nodes past its region",
                particle.id(),
                local.len() - coords.len()
            )));
        }

        let mut written = 0;
        for (own, shared, before) in cells {
            let after = (local.occupancy(own), local.occupant(own));
            if after != before {
                table.store_cell(shared, after.0, after.1);
                written += 1;
            }
        }
        trace!(particle = %particle.id(), written, "Committed region");
        Ok(report)
    }

    // Returns with every coordinate materialized and the read lock held
    fn read_region(&self, coords: &[Coord]) -> Result<(RwLockReadGuard<'_, NodeEnvironment>, Vec<NodeHandle>)> {
        loop {
            {
                let table = self.table.read().map_err(|_| SimError::LockPoisoned)?;
                let handles: Option<Vec<NodeHandle>> = coords.iter().map(|c| table.handle_of(*c)).collect();
                if let Some(handles) = handles {
                    return Ok((table, handles));
                }
            }

            // No region is held here, so growth cannot wait on a worker
            let mut table = self.table.write().map_err(|_| SimError::LockPoisoned)?;
            let before = table.len();
            for coord in coords {
                table.materialize(*coord);
            }
            if table.len() > before {
                debug!(added = table.len() - before, total = table.len(), "Materialized region nodes");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ParticleId;
    use crate::lattice::TriangularLattice;
    use crate::particle::ParticleParams;
    use crate::scheduler::audit;

    fn spawn(graph: &mut NodeGraph, id: u32, at: (i32, i32), seed: u64) -> Particle {
        let p = Particle::new(ParticleId::new(id), at.into(), at.into(), ParticleParams::default(), seed).unwrap();
        p.place_on(graph).unwrap();
        p
    }

    #[test]
    fn test_region_step_matches_direct_step() {
        let mut graph = NodeGraph::from_lattice(&TriangularLattice::new(8, 8).unwrap());
        let mut particles: Vec<Particle> = (0..4).map(|i| spawn(&mut graph, i, (4 + 2 * i as i32, 6), 17)).collect();
        let shared = SharedEnvironment::new(NodeEnvironment::from_graph(&graph), None);
        let mut mirrored = particles.clone();

        for _ in 0..100 {
            for (direct, regional) in particles.iter_mut().zip(mirrored.iter_mut()) {
                let expected = activate(direct, &mut graph, Algorithm::Compress, CompressionVariant::Sequential).unwrap();
                let got = shared
                    .activate(regional, Algorithm::Compress, CompressionVariant::Sequential)
                    .unwrap();
                assert_eq!(got.outcome, expected.outcome);
                assert_eq!((regional.head(), regional.tail()), (direct.head(), direct.tail()));
            }
        }

        let env = shared.into_inner().unwrap();
        audit(&env, &mirrored).unwrap();
        for handle in graph.handles() {
            let mirror = env.handle_of(graph.coord(handle)).unwrap();
            assert_eq!(env.cell(mirror), (graph.occupancy(handle), graph.occupant(handle)));
        }
    }

    #[test]
    fn test_region_at_edge_grows_table() {
        let mut graph = NodeGraph::from_lattice(&TriangularLattice::new(2, 2).unwrap());
        let mut particle = spawn(&mut graph, 0, (0, 0), 3);
        let shared = SharedEnvironment::new(NodeEnvironment::from_graph(&graph), None);
        assert_eq!(shared.node_count().unwrap(), 4);

        shared
            .activate(&mut particle, Algorithm::RandomMove, CompressionVariant::Sequential)
            .unwrap();
        assert!(shared.node_count().unwrap() >= 19);

        let env = shared.into_inner().unwrap();
        for coord in Coord::new(0, 0).ball(REGION_RADIUS) {
            assert!(env.handle_of(coord).is_some(), "{} missing", coord);
        }
        audit(&env, &[particle]).unwrap();
    }

    #[test]
    fn test_distant_particles_hold_disjoint_regions() {
        let recorder = Arc::new(HoldRecorder::new());
        let mut graph = NodeGraph::from_lattice(&TriangularLattice::new(20, 4).unwrap());
        let mut near = spawn(&mut graph, 0, (2, 2), 1);
        let mut far = spawn(&mut graph, 1, (30, 2), 1);
        let shared = SharedEnvironment::new(NodeEnvironment::from_graph(&graph), Some(Arc::clone(&recorder)));

        shared.activate(&mut near, Algorithm::Compress, CompressionVariant::Asynchronous).unwrap();
        shared.activate(&mut far, Algorithm::Compress, CompressionVariant::Asynchronous).unwrap();

        let holds = recorder.intervals();
        assert_eq!(holds.len(), 2);
        assert_eq!(holds[0].nodes.len(), 19);
        assert!(holds[0].nodes.iter().all(|n| !holds[1].nodes.contains(n)));
    }
}
