//! Operations shared by every node-environment representation
//!
//! `NodeGraph` (single-threaded arena) and `NodeEnvironment` (dense table
//! shared with workers) both implement `NodeStore`; the particle state
//! machine and the compression algorithm are written against the trait.

use serde::{Deserialize, Serialize};

use crate::core::error::PlacementError;
use crate::core::types::{NodeHandle, ParticleId};
use crate::graph::node::{Occupancy, Role};
use crate::lattice::{Coord, Port};

/// Outcome of a wall ping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PingResult {
    /// No wall within the requested depth
    Nothing,
    /// A wall sits `distance` steps away
    Wall { distance: u32 },
    /// A node `distance` steps away already knows a wall lies ahead
    Signal { distance: u32 },
}

pub trait NodeStore {
    /// Number of materialized nodes; handles are `0..len`
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle_of(&self, coord: Coord) -> Option<NodeHandle>;

    /// Handle for `coord`, allocating and linking an empty node if needed
    fn materialize(&mut self, coord: Coord) -> NodeHandle;

    fn coord(&self, handle: NodeHandle) -> Coord;

    /// Neighbor through `port` if it has been materialized
    fn linked(&self, handle: NodeHandle, port: Port) -> Option<NodeHandle>;

    fn occupancy(&self, handle: NodeHandle) -> Occupancy;

    fn occupant(&self, handle: NodeHandle) -> Option<ParticleId>;

    /// Raw write of a node's occupancy; callers keep head/tail consistent
    fn set_cell(&mut self, handle: NodeHandle, occupancy: Occupancy, occupant: Option<ParticleId>);

    fn signal(&self, handle: NodeHandle, port: Port) -> bool;

    fn set_signal(&mut self, handle: NodeHandle, port: Port);

    fn handles(&self) -> impl Iterator<Item = NodeHandle> {
        (0..self.len()).map(NodeHandle::new)
    }

    /// Neighbor through `port`, materializing an empty placeholder on demand
    fn neighbor(&mut self, handle: NodeHandle, port: Port) -> NodeHandle {
        match self.linked(handle, port) {
            Some(next) => next,
            None => {
                let coord = self.coord(handle).neighbor(port);
                self.materialize(coord)
            }
        }
    }

    /// Materialize all six neighbors of a node
    fn fill_null_nodes(&mut self, handle: NodeHandle) -> [NodeHandle; 6] {
        Port::ALL.map(|port| self.neighbor(handle, port))
    }

    /// Put part of a particle on a node
    ///
    /// Walls and occupied nodes are refused without mutation.
    fn place(&mut self, handle: NodeHandle, role: Role, particle: ParticleId) -> Result<(), PlacementError> {
        match self.occupancy(handle) {
            Occupancy::Wall => Err(PlacementError::Wall(self.coord(handle))),
            occ if occ.is_particle() => Err(PlacementError::Occupied(self.coord(handle))),
            _ => {
                self.set_cell(handle, role.into(), Some(particle));
                Ok(())
            }
        }
    }

    /// Clear any particle from a node; walls stay walls
    fn vacate(&mut self, handle: NodeHandle) {
        if self.occupancy(handle) != Occupancy::Wall {
            self.set_cell(handle, Occupancy::Empty, None);
        }
    }

    fn add_wall(&mut self, coord: Coord) -> Result<NodeHandle, PlacementError> {
        let handle = self.materialize(coord);
        if self.occupancy(handle).is_particle() {
            return Err(PlacementError::Occupied(coord));
        }
        self.set_cell(handle, Occupancy::Wall, None);
        Ok(handle)
    }

    /// Every node currently claiming to hold `particle`
    fn occupied_by(&self, particle: ParticleId) -> Vec<NodeHandle> {
        self.handles()
            .filter(|h| self.occupant(*h) == Some(particle) && self.occupancy(*h).is_particle())
            .collect()
    }

    /// Walk up to `depth` nodes along `port` looking for a wall
    ///
    /// Finding a wall marks the port's signal on every node walked before it.
    fn ping_for_wall(&mut self, from: NodeHandle, port: Port, depth: u32) -> PingResult {
        let mut trail = vec![from];
        let mut current = from;

        for step in 1..=depth {
            if self.signal(current, port) {
                return PingResult::Signal { distance: step - 1 };
            }
            current = self.neighbor(current, port);
            if self.occupancy(current) == Occupancy::Wall {
                for handle in trail {
                    self.set_signal(handle, port);
                }
                return PingResult::Wall { distance: step };
            }
            trail.push(current);
        }

        PingResult::Nothing
    }
}
