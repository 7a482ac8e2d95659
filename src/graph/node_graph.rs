//! Arena-backed node graph
//!
//! Nodes live in a `Vec` and are addressed by `NodeHandle`; an
//! `AHashMap<Coord, NodeHandle>` gives O(1) lookup for linking. Nodes are
//! never removed, so handles stay valid for the whole run.

use ahash::AHashMap;

use crate::core::types::{NodeHandle, ParticleId};
use crate::graph::node::{Node, Occupancy};
use crate::graph::store::NodeStore;
use crate::lattice::{Coord, Port, TriangularLattice};

/// Six-port adjacency over a growing set of lattice points
#[derive(Debug, Clone, Default)]
pub struct NodeGraph {
    nodes: Vec<Node>,
    index: AHashMap<Coord, NodeHandle>,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert every coordinate and link it to already-present neighbors
    pub fn build(coords: impl IntoIterator<Item = Coord>) -> Self {
        let mut graph = Self::new();
        graph.insert_all(coords);
        graph
    }

    pub fn from_lattice(lattice: &TriangularLattice) -> Self {
        let mut graph = Self {
            nodes: Vec::with_capacity(lattice.len()),
            index: AHashMap::with_capacity(lattice.len()),
        };
        graph.insert_all(lattice.points());
        graph
    }

    fn insert_all(&mut self, coords: impl IntoIterator<Item = Coord>) {
        for coord in coords {
            self.materialize(coord);
        }
    }

    pub fn node(&self, handle: NodeHandle) -> &Node {
        &self.nodes[handle.index()]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Coordinates of all particle-held nodes
    pub fn occupied_coords(&self) -> impl Iterator<Item = Coord> + '_ {
        self.nodes
            .iter()
            .filter(|node| node.occupancy.is_particle())
            .map(|node| node.coord)
    }
}

impl NodeStore for NodeGraph {
    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn handle_of(&self, coord: Coord) -> Option<NodeHandle> {
        self.index.get(&coord).copied()
    }

    fn materialize(&mut self, coord: Coord) -> NodeHandle {
        if let Some(handle) = self.index.get(&coord) {
            return *handle;
        }

        let handle = NodeHandle::new(self.nodes.len());
        let mut node = Node::new(coord);

        for port in Port::ALL {
            if let Some(&other) = self.index.get(&coord.neighbor(port)) {
                node.neighbors[port.index()] = Some(other);
                self.nodes[other.index()].neighbors[port.opposite().index()] = Some(handle);
            }
        }

        self.nodes.push(node);
        self.index.insert(coord, handle);
        handle
    }

    fn coord(&self, handle: NodeHandle) -> Coord {
        self.nodes[handle.index()].coord
    }

    fn linked(&self, handle: NodeHandle, port: Port) -> Option<NodeHandle> {
        self.nodes[handle.index()].neighbor(port)
    }

    fn occupancy(&self, handle: NodeHandle) -> Occupancy {
        self.nodes[handle.index()].occupancy
    }

    fn occupant(&self, handle: NodeHandle) -> Option<ParticleId> {
        self.nodes[handle.index()].occupant
    }

    fn set_cell(&mut self, handle: NodeHandle, occupancy: Occupancy, occupant: Option<ParticleId>) {
        let node = &mut self.nodes[handle.index()];
        node.occupancy = occupancy;
        node.occupant = occupant;
    }

    fn signal(&self, handle: NodeHandle, port: Port) -> bool {
        self.nodes[handle.index()].signal(port)
    }

    fn set_signal(&mut self, handle: NodeHandle, port: Port) {
        self.nodes[handle.index()].signals |= 1 << port.index();
    }
}
