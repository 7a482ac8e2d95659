//! One activation of one particle
//!
//! A contracted particle tries to expand through a random port. An
//! expanded particle evaluates the contraction gates and either moves onto
//! its head or reverts onto its tail, so an activation never leaves a
//! particle expanded.

use clap::ValueEnum;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::compression::rules::{evaluate_gates, has_expanded_head_neighbor, CompressionVariant, GateReport};
use crate::core::error::Result;
use crate::graph::NodeStore;
use crate::lattice::Port;
use crate::particle::{ContractToward, Particle};

/// Movement rule applied on activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Algorithm {
    /// Metropolis-filtered compression chain
    #[default]
    Compress,
    /// Unbiased diffusion: expand through a random open port and move there
    RandomMove,
}

/// What an activation did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveOutcome {
    /// The clock did not fire
    Idle,
    /// Expansion was refused and nothing changed
    Blocked,
    /// The particle ended on a new node
    Moved,
    /// The particle expanded but collapsed back onto its tail
    Reverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub outcome: MoveOutcome,
    /// Gate values when a contraction was evaluated
    pub gates: Option<GateReport>,
}

impl StepReport {
    pub fn idle() -> Self {
        Self { outcome: MoveOutcome::Idle, gates: None }
    }

    fn plain(outcome: MoveOutcome) -> Self {
        Self { outcome, gates: None }
    }
}

fn random_port(particle: &mut Particle) -> Port {
    Port::ALL[particle.rng_mut().gen_range(0..Port::ALL.len())]
}

/// Run one activation of `particle` against `store`
pub fn activate<S: NodeStore>(
    particle: &mut Particle,
    store: &mut S,
    algorithm: Algorithm,
    variant: CompressionVariant,
) -> Result<StepReport> {
    match algorithm {
        Algorithm::Compress => compress_step(particle, store, variant),
        Algorithm::RandomMove => random_move_step(particle, store),
    }
}

fn compress_step<S: NodeStore>(particle: &mut Particle, store: &mut S, variant: CompressionVariant) -> Result<StepReport> {
    if particle.is_contracted() {
        let port = random_port(particle);
        let (own, _) = particle.locate(store)?;
        if has_expanded_head_neighbor(store, own, None) {
            return Ok(StepReport::plain(MoveOutcome::Blocked));
        }
        if !particle.expand(store, port)? {
            return Ok(StepReport::plain(MoveOutcome::Blocked));
        }
        let (head, tail) = particle.locate(store)?;
        let settled = !has_expanded_head_neighbor(store, head, Some(tail))
            && !has_expanded_head_neighbor(store, tail, Some(head));
        particle.set_compressed(settled);
        trace!(particle = %particle.id(), ?port, settled, "expanded");
    }

    contract_step(particle, store, variant)
}

fn contract_step<S: NodeStore>(particle: &mut Particle, store: &mut S, variant: CompressionVariant) -> Result<StepReport> {
    let q: f64 = particle.rng_mut().gen();
    let (head, tail) = particle.locate(store)?;
    let status_flag = match variant {
        CompressionVariant::Sequential => true,
        CompressionVariant::Asynchronous => particle.compressed(),
    };

    let gates = evaluate_gates(store, head, tail, q, particle.tau0(), status_flag)?;
    let outcome = if gates.accepted() {
        particle.contract(store, ContractToward::Head)?;
        MoveOutcome::Moved
    } else {
        particle.contract(store, ContractToward::Tail)?;
        MoveOutcome::Reverted
    };
    trace!(particle = %particle.id(), ?outcome, e_head = gates.e_head, e_tail = gates.e_tail, "contracted");

    Ok(StepReport {
        outcome,
        gates: Some(gates),
    })
}

fn random_move_step<S: NodeStore>(particle: &mut Particle, store: &mut S) -> Result<StepReport> {
    if !particle.is_contracted() {
        particle.contract(store, ContractToward::Head)?;
        return Ok(StepReport::plain(MoveOutcome::Moved));
    }

    let port = random_port(particle);
    if !particle.expand(store, port)? {
        return Ok(StepReport::plain(MoveOutcome::Blocked));
    }
    particle.contract(store, ContractToward::Head)?;
    Ok(StepReport::plain(MoveOutcome::Moved))
}
