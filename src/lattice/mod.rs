//! Triangular lattice geometry

pub mod builder;
pub mod coord;

pub use builder::TriangularLattice;
pub use coord::{Coord, Port};
