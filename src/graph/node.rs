//! Lattice node and occupancy codes

use serde::{Deserialize, Serialize};

use crate::core::types::{NodeHandle, ParticleId};
use crate::lattice::{Coord, Port};

/// What currently sits on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Occupancy {
    #[default]
    Empty,
    Wall,
    Contracted,
    ExpandedHead,
    ExpandedTail,
}

impl Occupancy {
    /// True when a particle (in any form) holds the node
    pub fn is_particle(&self) -> bool {
        matches!(
            self,
            Occupancy::Contracted | Occupancy::ExpandedHead | Occupancy::ExpandedTail
        )
    }

    /// True when a particle could expand into the node
    pub fn is_open(&self) -> bool {
        matches!(self, Occupancy::Empty)
    }

    /// Compact code used by the shared node table
    pub fn code(&self) -> u8 {
        match self {
            Occupancy::Empty => 0,
            Occupancy::Wall => 1,
            Occupancy::Contracted => 2,
            Occupancy::ExpandedHead => 3,
            Occupancy::ExpandedTail => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Occupancy> {
        match code {
            0 => Some(Occupancy::Empty),
            1 => Some(Occupancy::Wall),
            2 => Some(Occupancy::Contracted),
            3 => Some(Occupancy::ExpandedHead),
            4 => Some(Occupancy::ExpandedTail),
            _ => None,
        }
    }
}

/// The part of a particle sitting on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Contracted,
    Head,
    Tail,
}

impl From<Role> for Occupancy {
    fn from(role: Role) -> Self {
        match role {
            Role::Contracted => Occupancy::Contracted,
            Role::Head => Occupancy::ExpandedHead,
            Role::Tail => Occupancy::ExpandedTail,
        }
    }
}

/// One lattice cell in the pointer-free graph view
#[derive(Debug, Clone)]
pub struct Node {
    pub coord: Coord,
    pub neighbors: [Option<NodeHandle>; 6],
    pub occupancy: Occupancy,
    pub occupant: Option<ParticleId>,
    /// One bit per port, set once a wall was found along that port
    pub signals: u8,
}

impl Node {
    pub fn new(coord: Coord) -> Self {
        Self {
            coord,
            neighbors: [None; 6],
            occupancy: Occupancy::Empty,
            occupant: None,
            signals: 0,
        }
    }

    pub fn neighbor(&self, port: Port) -> Option<NodeHandle> {
        self.neighbors[port.index()]
    }

    pub fn signal(&self, port: Port) -> bool {
        self.signals & (1 << port.index()) != 0
    }
}
