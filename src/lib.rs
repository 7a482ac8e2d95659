//! Amoebot Sim - self-organizing particle system on the triangular lattice
//!
//! Particles on a triangular lattice expand and contract using only local
//! information, driven by a Metropolis-filtered compression chain, and
//! gather into a compact blob. Runs can be scheduled sequentially or on a
//! pool of concurrent workers sharing one node environment.

pub mod compression;
pub mod connectivity;
pub mod core;
pub mod graph;
pub mod lattice;
pub mod particle;
pub mod placement;
pub mod runner;
pub mod scheduler;
pub mod tracker;

pub use crate::core::config::RunConfig;
pub use crate::core::error::{Result, SimError};
pub use crate::runner::{simulate, SimulationOutput};
