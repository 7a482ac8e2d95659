//! Particle entities and their activation clocks

pub mod clock;
pub mod entity;

pub use clock::{Activation, ActivationClock};
pub use entity::{ContractToward, Particle, ParticleParams, ParticleSnapshot, ParticleState};
