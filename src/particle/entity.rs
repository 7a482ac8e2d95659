//! Particle state machine
//!
//! A particle is Contracted (head == tail) or Expanded (head adjacent to
//! tail). `expand` is only valid from Contracted and `contract` only from
//! Expanded; head/tail equality is the sole branching condition.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::{MovementError, PlacementError, Result, SimError};
use crate::core::types::{ClockValue, NodeHandle, ParticleId};
use crate::graph::{NodeStore, Occupancy, Role};
use crate::lattice::{Coord, Port};
use crate::particle::clock::{Activation, ActivationClock};

const SEED_SPREAD: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleState {
    Contracted,
    Expanded,
}

/// Which end survives a contraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractToward {
    Head,
    Tail,
}

/// Per-particle tunables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleParams {
    /// Poisson rate of the activation clock
    pub mu: f64,
    /// Metropolis bias; smaller values push harder toward compaction
    pub tau0: f64,
}

impl Default for ParticleParams {
    fn default() -> Self {
        Self { mu: 1.0, tau0: 1.0 }
    }
}

/// State reported to the tracker after each turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleSnapshot {
    pub particle: ParticleId,
    pub head: Coord,
    pub tail: Coord,
    pub clock: ClockValue,
}

#[derive(Debug, Clone)]
pub struct Particle {
    id: ParticleId,
    head: Coord,
    tail: Coord,
    clock: ActivationClock,
    tau0: f64,
    compressed: bool,
    rng: ChaCha8Rng,
}

impl Particle {
    /// Create a particle; `tail` equal to `head` means contracted
    pub fn new(id: ParticleId, head: Coord, tail: Coord, params: ParticleParams, seed: u64) -> Result<Self> {
        if head != tail && !head.is_adjacent(&tail) {
            return Err(PlacementError::NotAdjacent { head, tail }.into());
        }
        if !params.tau0.is_finite() || params.tau0 <= 0.0 {
            return Err(SimError::InvalidParameter(format!("tau0 must be positive, got {}", params.tau0)));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed ^ (id.raw() as u64 + 1).wrapping_mul(SEED_SPREAD));
        let clock = ActivationClock::new(params.mu, &mut rng)?;

        Ok(Self {
            id,
            head,
            tail,
            clock,
            tau0: params.tau0,
            compressed: false,
            rng,
        })
    }

    pub fn id(&self) -> ParticleId {
        self.id
    }

    pub fn head(&self) -> Coord {
        self.head
    }

    pub fn tail(&self) -> Coord {
        self.tail
    }

    pub fn clock(&self) -> ClockValue {
        self.clock.value()
    }

    pub fn tau0(&self) -> f64 {
        self.tau0
    }

    /// Compression-status flag from the last expansion
    pub fn compressed(&self) -> bool {
        self.compressed
    }

    pub(crate) fn set_compressed(&mut self, value: bool) {
        self.compressed = value;
    }

    pub(crate) fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn is_contracted(&self) -> bool {
        self.head == self.tail
    }

    pub fn state(&self) -> ParticleState {
        if self.is_contracted() {
            ParticleState::Contracted
        } else {
            ParticleState::Expanded
        }
    }

    pub fn snapshot(&self) -> ParticleSnapshot {
        ParticleSnapshot {
            particle: self.id,
            head: self.head,
            tail: self.tail,
            clock: self.clock.value(),
        }
    }

    /// Count down the activation clock
    pub fn tick(&mut self) -> Activation {
        self.clock.tick(&mut self.rng)
    }

    /// Claim the particle's node(s) on a store
    ///
    /// Either every node is claimed or none is.
    pub fn place_on<S: NodeStore>(&self, store: &mut S) -> std::result::Result<(), PlacementError> {
        let head = store.materialize(self.head);
        if self.is_contracted() {
            return store.place(head, Role::Contracted, self.id);
        }

        let tail = store.materialize(self.tail);
        store.place(head, Role::Head, self.id)?;
        if let Err(e) = store.place(tail, Role::Tail, self.id) {
            store.vacate(head);
            return Err(e);
        }
        Ok(())
    }

    /// Node handles for head and tail, checked against the store
    pub fn locate<S: NodeStore>(&self, store: &S) -> Result<(NodeHandle, NodeHandle)> {
        let (head_role, tail_role) = if self.is_contracted() {
            (Occupancy::Contracted, Occupancy::Contracted)
        } else {
            (Occupancy::ExpandedHead, Occupancy::ExpandedTail)
        };
        let head = self.checked_handle(store, self.head, head_role)?;
        let tail = self.checked_handle(store, self.tail, tail_role)?;
        Ok((head, tail))
    }

    fn checked_handle<S: NodeStore>(&self, store: &S, coord: Coord, expected: Occupancy) -> Result<NodeHandle> {
        let handle = store.handle_of(coord).ok_or_else(|| {
            SimError::InvariantViolation(format!("{} sits on unmaterialized node {}", self.id, coord))
        })?;
        if store.occupant(handle) != Some(self.id) || store.occupancy(handle) != expected {
            return Err(SimError::InvariantViolation(format!(
                "{} expected {:?} at {}, found {:?} owned by {:?}",
                self.id,
                expected,
                coord,
                store.occupancy(handle),
                store.occupant(handle)
            )));
        }
        Ok(handle)
    }

    /// Expand through `port`
    ///
    /// Returns `Ok(false)` without mutation when the target is a wall or
    /// occupied. The old position becomes the tail, the target the head.
    pub fn expand<S: NodeStore>(&mut self, store: &mut S, port: Port) -> Result<bool> {
        if !self.is_contracted() {
            return Err(MovementError::AlreadyExpanded(self.id).into());
        }
        let (own, _) = self.locate(store)?;
        let target = store.neighbor(own, port);
        if !store.occupancy(target).is_open() {
            return Ok(false);
        }

        store.set_cell(target, Occupancy::ExpandedHead, Some(self.id));
        store.set_cell(own, Occupancy::ExpandedTail, Some(self.id));
        self.tail = self.head;
        self.head = store.coord(target);
        Ok(true)
    }

    /// Collapse onto the head or the tail, vacating the other node
    pub fn contract<S: NodeStore>(&mut self, store: &mut S, toward: ContractToward) -> Result<()> {
        if self.is_contracted() {
            return Err(MovementError::AlreadyContracted(self.id).into());
        }
        let (head, tail) = self.locate(store)?;
        match toward {
            ContractToward::Head => {
                store.set_cell(head, Occupancy::Contracted, Some(self.id));
                store.vacate(tail);
                self.tail = self.head;
            }
            ContractToward::Tail => {
                store.set_cell(tail, Occupancy::Contracted, Some(self.id));
                store.vacate(head);
                self.head = self.tail;
            }
        }
        Ok(())
    }
}
