//! Dense table view of the node environment
//!
//! One column per node, stored struct-of-arrays style:
//! materialized flag, x, y, packed occupancy/owner cell and six neighbor
//! column indices (`UNLINKED` = not materialized yet). Capacity doubles when
//! every column is in use. This is the block handed to concurrent workers.
//!
//! Cells are atomics so a worker can write the nodes it has locked through a
//! shared reference while other workers read and write disjoint nodes. The
//! table layout itself (columns, links, coordinate index) only changes
//! through `&mut self`.

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

use crate::core::types::{NodeHandle, ParticleId};
use crate::graph::node::Occupancy;
use crate::graph::node_graph::NodeGraph;
use crate::graph::store::NodeStore;
use crate::lattice::{Coord, Port};

/// Neighbor slot value for a neighbor that has not been materialized
pub const UNLINKED: i64 = -1;

/// Owner value for a node without a particle
pub const NO_OWNER: i64 = -1;

const MIN_CAPACITY: usize = 16;

const EMPTY_CELL: u64 = 0;

// Low byte: occupancy code. Upper bits: owner id + 1, zero for none.
fn pack(occupancy: Occupancy, occupant: Option<ParticleId>) -> u64 {
    let owner = occupant.map_or(0, |p| p.raw() as u64 + 1);
    (owner << 8) | occupancy.code() as u64
}

fn unpack(cell: u64) -> (Occupancy, Option<ParticleId>) {
    let occupancy = Occupancy::from_code((cell & 0xFF) as u8).unwrap_or_default();
    let owner = cell >> 8;
    let occupant = (owner != 0).then(|| ParticleId::new((owner - 1) as u32));
    (occupancy, occupant)
}

/// Copy of a single column, for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeColumn {
    pub materialized: bool,
    pub x: i32,
    pub y: i32,
    pub owner: i64,
    pub occupancy: Occupancy,
    pub neighbors: [i64; 6],
}

#[derive(Debug)]
pub struct NodeEnvironment {
    materialized: Vec<bool>,
    xs: Vec<i32>,
    ys: Vec<i32>,
    cells: Vec<AtomicU64>,
    neighbors: Vec<[i64; 6]>,
    signals: Vec<u8>,
    index: AHashMap<Coord, usize>,
    len: usize,
}

impl NodeEnvironment {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        Self {
            materialized: vec![false; capacity],
            xs: vec![0; capacity],
            ys: vec![0; capacity],
            cells: (0..capacity).map(|_| AtomicU64::new(EMPTY_CELL)).collect(),
            neighbors: vec![[UNLINKED; 6]; capacity],
            signals: vec![0; capacity],
            index: AHashMap::with_capacity(capacity),
            len: 0,
        }
    }

    /// Snapshot a graph; column `i` mirrors the graph node with handle `i`
    pub fn from_graph(graph: &NodeGraph) -> Self {
        let mut env = Self::with_capacity(graph.len() * 2);
        for (i, node) in graph.nodes().iter().enumerate() {
            env.materialized[i] = true;
            env.xs[i] = node.coord.x;
            env.ys[i] = node.coord.y;
            *env.cells[i].get_mut() = pack(node.occupancy, node.occupant);
            env.neighbors[i] = node.neighbors.map(|n| n.map_or(UNLINKED, |h| h.index() as i64));
            env.signals[i] = node.signals;
            env.index.insert(node.coord, i);
        }
        env.len = graph.len();
        env
    }

    pub fn capacity(&self) -> usize {
        self.materialized.len()
    }

    pub fn column(&self, handle: NodeHandle) -> NodeColumn {
        let i = handle.index();
        let (occupancy, occupant) = self.cell(handle);
        NodeColumn {
            materialized: self.materialized[i],
            x: self.xs[i],
            y: self.ys[i],
            owner: occupant.map_or(NO_OWNER, |p| p.raw() as i64),
            occupancy,
            neighbors: self.neighbors[i],
        }
    }

    /// Occupancy and owner of a node
    pub fn cell(&self, handle: NodeHandle) -> (Occupancy, Option<ParticleId>) {
        unpack(self.cells[handle.index()].load(Ordering::Acquire))
    }

    /// Overwrite a node through a shared reference
    ///
    /// The caller must hold the region lock covering `handle`; two writers
    /// on the same node would otherwise race.
    pub fn store_cell(&self, handle: NodeHandle, occupancy: Occupancy, occupant: Option<ParticleId>) {
        self.cells[handle.index()].store(pack(occupancy, occupant), Ordering::Release);
    }

    fn grow(&mut self) {
        let capacity = (self.capacity() * 2).max(MIN_CAPACITY);
        self.materialized.resize(capacity, false);
        self.xs.resize(capacity, 0);
        self.ys.resize(capacity, 0);
        self.cells.resize_with(capacity, || AtomicU64::new(EMPTY_CELL));
        self.neighbors.resize(capacity, [UNLINKED; 6]);
        self.signals.resize(capacity, 0);
        tracing::debug!("Grew node environment to {} columns", capacity);
    }
}

impl Default for NodeEnvironment {
    fn default() -> Self {
        Self::with_capacity(MIN_CAPACITY)
    }
}

impl NodeStore for NodeEnvironment {
    fn len(&self) -> usize {
        self.len
    }

    fn handle_of(&self, coord: Coord) -> Option<NodeHandle> {
        self.index.get(&coord).map(|&i| NodeHandle::new(i))
    }

    fn materialize(&mut self, coord: Coord) -> NodeHandle {
        if let Some(&i) = self.index.get(&coord) {
            return NodeHandle::new(i);
        }
        if self.len == self.capacity() {
            self.grow();
        }

        let col = self.len;
        self.materialized[col] = true;
        self.xs[col] = coord.x;
        self.ys[col] = coord.y;
        *self.cells[col].get_mut() = EMPTY_CELL;
        self.neighbors[col] = [UNLINKED; 6];
        self.signals[col] = 0;

        for port in Port::ALL {
            if let Some(&other) = self.index.get(&coord.neighbor(port)) {
                self.neighbors[col][port.index()] = other as i64;
                self.neighbors[other][port.opposite().index()] = col as i64;
            }
        }

        self.index.insert(coord, col);
        self.len += 1;
        NodeHandle::new(col)
    }

    fn coord(&self, handle: NodeHandle) -> Coord {
        let i = handle.index();
        Coord::new(self.xs[i], self.ys[i])
    }

    fn linked(&self, handle: NodeHandle, port: Port) -> Option<NodeHandle> {
        let raw = self.neighbors[handle.index()][port.index()];
        (raw != UNLINKED).then(|| NodeHandle::new(raw as usize))
    }

    fn occupancy(&self, handle: NodeHandle) -> Occupancy {
        self.cell(handle).0
    }

    fn occupant(&self, handle: NodeHandle) -> Option<ParticleId> {
        self.cell(handle).1
    }

    fn set_cell(&mut self, handle: NodeHandle, occupancy: Occupancy, occupant: Option<ParticleId>) {
        *self.cells[handle.index()].get_mut() = pack(occupancy, occupant);
    }

    fn signal(&self, handle: NodeHandle, port: Port) -> bool {
        self.signals[handle.index()] & (1 << port.index()) != 0
    }

    fn set_signal(&mut self, handle: NodeHandle, port: Port) {
        self.signals[handle.index()] |= 1 << port.index();
    }
}
