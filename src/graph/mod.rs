//! Node graph over the triangular lattice
//!
//! Two equivalent representations share the `NodeStore` contract: the
//! arena-backed `NodeGraph` for single-threaded runs and the dense
//! `NodeEnvironment` table for concurrent workers.

pub mod environment;
pub mod node;
pub mod node_graph;
pub mod store;

pub use environment::{NodeColumn, NodeEnvironment, NO_OWNER, UNLINKED};
pub use node::{Node, Occupancy, Role};
pub use node_graph::NodeGraph;
pub use store::{NodeStore, PingResult};
