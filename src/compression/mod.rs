//! Local compression chain and the random-move baseline

pub mod rules;
pub mod step;

pub use rules::{acceptance_probability, metropolis_accepts, structural_condition, CompressionVariant, GateReport};
pub use step::{activate, Algorithm, MoveOutcome, StepReport};
