use thiserror::Error;

use crate::core::types::ParticleId;
use crate::lattice::Coord;

/// Reasons a node refuses a particle or wall
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("node {0} is a wall")]
    Wall(Coord),

    #[error("node {0} is already occupied")]
    Occupied(Coord),

    #[error("head {head} and tail {tail} are not adjacent")]
    NotAdjacent { head: Coord, tail: Coord },

    #[error("coordinate {0} is listed twice")]
    Duplicate(Coord),
}

/// Misuse of the particle state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MovementError {
    #[error("{0} is already expanded")]
    AlreadyExpanded(ParticleId),

    #[error("{0} is already contracted")]
    AlreadyContracted(ParticleId),
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid lattice dimensions: {width}x{height}")]
    InvalidDimensions { width: i64, height: i64 },

    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    #[error("Placement rejected: {0}")]
    Placement(#[from] PlacementError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Movement error: {0}")]
    Movement(#[from] MovementError),

    #[error("Node environment lock poisoned")]
    LockPoisoned,

    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SimError {
    /// True for errors raised while validating run parameters or the
    /// initial configuration, before any particle has moved
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SimError::InvalidDimensions { .. }
                | SimError::InvalidPlacement(_)
                | SimError::Placement(_)
                | SimError::InvalidParameter(_)
                | SimError::Toml(_)
        )
    }

    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, SimError::InvariantViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
