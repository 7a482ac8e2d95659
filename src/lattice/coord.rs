//! Triangular lattice coordinates and port directions
//!
//! Points live on a doubled-width grid: moving east or west changes `x` by 2,
//! the four diagonal moves change both `x` and `y` by 1. Every point of one
//! lattice therefore shares the parity of `x + y`.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// A point of the triangular lattice
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, Display,
)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
#[display(fmt = "({}, {})", x, y)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The point one step away through `port`
    pub fn neighbor(&self, port: Port) -> Coord {
        let (dx, dy) = port.offset();
        Coord::new(self.x + dx, self.y + dy)
    }

    /// All six neighbors in port order
    pub fn neighbors(&self) -> [Coord; 6] {
        Port::ALL.map(|port| self.neighbor(port))
    }

    /// Port leading from `self` to an adjacent `other`, if they are adjacent
    pub fn port_towards(&self, other: &Coord) -> Option<Port> {
        let delta = (other.x - self.x, other.y - self.y);
        Port::ALL.into_iter().find(|port| port.offset() == delta)
    }

    pub fn is_adjacent(&self, other: &Coord) -> bool {
        self.port_towards(other).is_some()
    }

    /// True when both points belong to the same lattice (same `x + y` parity)
    pub fn same_lattice(&self, other: &Coord) -> bool {
        (self.x + self.y - other.x - other.y).rem_euclid(2) == 0
    }

    /// Every lattice point within `radius` hops, including `self`
    pub fn ball(&self, radius: u32) -> Vec<Coord> {
        let r = radius as i32;
        let mut points = Vec::new();
        for dy in -r..=r {
            let reach = dy.abs() + 2 * (r - dy.abs());
            for dx in (-reach..=reach).step_by(2) {
                points.push(Coord::new(self.x + dx, self.y + dy));
            }
        }
        points
    }

    /// Hop count between two points of the same lattice
    pub fn distance(&self, other: &Coord) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dy + dx.saturating_sub(dy) / 2
    }
}

impl From<[i32; 2]> for Coord {
    fn from(value: [i32; 2]) -> Self {
        Coord::new(value[0], value[1])
    }
}

impl From<Coord> for [i32; 2] {
    fn from(value: Coord) -> Self {
        [value.x, value.y]
    }
}

impl From<(i32, i32)> for Coord {
    fn from(value: (i32, i32)) -> Self {
        Coord::new(value.0, value.1)
    }
}

/// One of the six clockwise-ordered neighbor slots around a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Port {
    West,
    NorthWest,
    NorthEast,
    East,
    SouthEast,
    SouthWest,
}

impl Port {
    /// All ports, clockwise from west
    pub const ALL: [Port; 6] = [
        Port::West,
        Port::NorthWest,
        Port::NorthEast,
        Port::East,
        Port::SouthEast,
        Port::SouthWest,
    ];

    /// Coordinate offset for this port
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Port::West => (-2, 0),
            Port::NorthWest => (-1, 1),
            Port::NorthEast => (1, 1),
            Port::East => (2, 0),
            Port::SouthEast => (1, -1),
            Port::SouthWest => (-1, -1),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Port::West => 0,
            Port::NorthWest => 1,
            Port::NorthEast => 2,
            Port::East => 3,
            Port::SouthEast => 4,
            Port::SouthWest => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Port> {
        Port::ALL.get(index).copied()
    }

    pub fn opposite(&self) -> Port {
        Port::ALL[(self.index() + 3) % 6]
    }

    /// Next port in clockwise order
    pub fn clockwise(&self) -> Port {
        Port::ALL[(self.index() + 1) % 6]
    }
}
