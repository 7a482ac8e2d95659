//! Acceptance gates for the contraction step
//!
//! For an expanded particle with head `l'` and tail `l`, let `H` and `T` be
//! the occupied neighbors of head and tail (excluding each other) and
//! `S = H ∩ T`. Contracting forward onto the head is allowed only when
//! every gate passes:
//!
//! 1. no hole: `|T| != 5`
//! 2. structure: `|S| ∈ {1, 2}` and `H ∪ T` is connected to `S` inside
//!    `H ∪ T`, or `|S| = 0` and `H`, `T` are each non-empty and connected
//! 3. Metropolis: `q < exp((|H| - |T|) / tau0)`
//! 4. status flag (asynchronous variant only)

use ahash::AHashSet;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::connectivity::{covered_from_any, induced_adjacency, is_connected};
use crate::core::error::{Result, SimError};
use crate::core::types::NodeHandle;
use crate::graph::{NodeStore, Occupancy};
use crate::lattice::{Coord, Port};

/// Tail neighbor count that would leave a hole behind
const SEALED_TAIL: usize = 5;

/// Which flavour of the compression chain to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum CompressionVariant {
    /// Centralized chain; the status-flag gate is always satisfied
    Sequential,
    /// Local asynchronous chain; the status flag must be set
    #[default]
    Asynchronous,
}

/// Every gate of one contraction decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub e_head: usize,
    pub e_tail: usize,
    pub shared: usize,
    pub no_hole: bool,
    pub structural: bool,
    pub metropolis: bool,
    pub status_flag: bool,
}

impl GateReport {
    pub fn accepted(&self) -> bool {
        self.no_hole && self.structural && self.metropolis && self.status_flag
    }
}

/// Occupied neighbors of `around`, skipping `skip`
///
/// Missing neighbors are materialized as empty placeholders first.
pub fn occupied_neighbors<S: NodeStore>(store: &mut S, around: NodeHandle, skip: Option<NodeHandle>) -> AHashSet<Coord> {
    store
        .fill_null_nodes(around)
        .into_iter()
        .filter(|n| Some(*n) != skip && store.occupancy(*n).is_particle())
        .map(|n| store.coord(n))
        .collect()
}

/// True when some neighbor of `around` (other than `skip`) is an expanded head
pub fn has_expanded_head_neighbor<S: NodeStore>(store: &mut S, around: NodeHandle, skip: Option<NodeHandle>) -> bool {
    Port::ALL.iter().any(|port| {
        let n = store.neighbor(around, *port);
        Some(n) != skip && store.occupancy(n) == Occupancy::ExpandedHead
    })
}

/// `min(1, exp((e_head - e_tail) / tau0))`
pub fn acceptance_probability(e_head: usize, e_tail: usize, tau0: f64) -> f64 {
    ((e_head as f64 - e_tail as f64) / tau0).exp().min(1.0)
}

pub fn metropolis_accepts(q: f64, e_head: usize, e_tail: usize, tau0: f64) -> bool {
    q < ((e_head as f64 - e_tail as f64) / tau0).exp()
}

/// Shared-neighbor connectivity gate
///
/// More than two shared neighbors cannot happen on the triangular lattice
/// and is reported as an invariant violation.
pub fn structural_condition(head_nbrs: &AHashSet<Coord>, tail_nbrs: &AHashSet<Coord>) -> Result<bool> {
    let shared: Vec<Coord> = head_nbrs.intersection(tail_nbrs).copied().collect();
    match shared.len() {
        1 | 2 => {
            let union: AHashSet<Coord> = head_nbrs.union(tail_nbrs).copied().collect();
            let adjacency = induced_adjacency(&union);
            Ok(covered_from_any(&adjacency, &shared, &union))
        }
        0 => Ok(!head_nbrs.is_empty()
            && !tail_nbrs.is_empty()
            && is_connected(head_nbrs)
            && is_connected(tail_nbrs)),
        n => Err(SimError::InvariantViolation(format!(
            "head and tail share {} occupied neighbors",
            n
        ))),
    }
}

/// Evaluate all gates for contracting an expanded particle onto its head
pub fn evaluate_gates<S: NodeStore>(
    store: &mut S,
    head: NodeHandle,
    tail: NodeHandle,
    q: f64,
    tau0: f64,
    status_flag: bool,
) -> Result<GateReport> {
    let head_nbrs = occupied_neighbors(store, head, Some(tail));
    let tail_nbrs = occupied_neighbors(store, tail, Some(head));
    let (e_head, e_tail) = (head_nbrs.len(), tail_nbrs.len());

    Ok(GateReport {
        e_head,
        e_tail,
        shared: head_nbrs.intersection(&tail_nbrs).count(),
        no_hole: e_tail != SEALED_TAIL,
        structural: structural_condition(&head_nbrs, &tail_nbrs)?,
        metropolis: metropolis_accepts(q, e_head, e_tail, tau0),
        status_flag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(coords: &[(i32, i32)]) -> AHashSet<Coord> {
        coords.iter().map(|&c| Coord::from(c)).collect()
    }

    #[test]
    fn test_metropolis_always_accepts_downhill() {
        assert!(metropolis_accepts(0.999, 3, 1, 1.0));
        assert_eq!(acceptance_probability(3, 1, 1.0), 1.0);
    }

    #[test]
    fn test_metropolis_uphill_is_bounded() {
        let p = acceptance_probability(1, 3, 1.0);
        assert!((p - (-2.0f64).exp()).abs() < 1e-12);
        assert!(metropolis_accepts(p - 1e-9, 1, 3, 1.0));
        assert!(!metropolis_accepts(p + 1e-9, 1, 3, 1.0));
    }

    #[test]
    fn test_small_tau0_sharpens_bias() {
        assert!(acceptance_probability(1, 2, 0.25) < acceptance_probability(1, 2, 4.0));
    }

    #[test]
    fn test_structural_shared_neighbor_connects_union() {
        // Head (2,0), tail (0,0): shared neighbors are (1,1) and (1,-1)
        let head = set(&[(1, 1), (3, 1)]);
        let tail = set(&[(1, 1)]);
        assert!(structural_condition(&head, &tail).unwrap());
    }

    #[test]
    fn test_structural_shared_neighbor_with_stray() {
        // (4,0) touches the head but is not connected to (1,-1) inside H ∪ T
        let head = set(&[(1, -1), (4, 0)]);
        let tail = set(&[(1, -1)]);
        assert!(!structural_condition(&head, &tail).unwrap());
    }

    #[test]
    fn test_structural_no_shared_needs_both_sides() {
        let head = set(&[(4, 0)]);
        assert!(!structural_condition(&head, &AHashSet::new()).unwrap());
        assert!(!structural_condition(&AHashSet::new(), &AHashSet::new()).unwrap());

        let tail = set(&[(-2, 0)]);
        assert!(structural_condition(&head, &tail).unwrap());
    }

    #[test]
    fn test_structural_no_shared_requires_connected_sides() {
        // Head neighbors (4,0) and (1,1) are not lattice-adjacent
        let head = set(&[(4, 0), (1, 1)]);
        let tail = set(&[(-2, 0)]);
        let head_only: AHashSet<Coord> = head.iter().copied().filter(|c| c.x != 1).collect();
        assert!(structural_condition(&head_only, &tail).unwrap());
        assert!(!structural_condition(&head, &tail).unwrap());
    }

    #[test]
    fn test_structural_rejects_impossible_overlap() {
        let shared = set(&[(1, 1), (1, -1), (3, 1)]);
        assert!(matches!(
            structural_condition(&shared, &shared),
            Err(SimError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_gate_report_requires_every_gate() {
        let mut report = GateReport {
            e_head: 2,
            e_tail: 1,
            shared: 1,
            no_hole: true,
            structural: true,
            metropolis: true,
            status_flag: true,
        };
        assert!(report.accepted());
        report.status_flag = false;
        assert!(!report.accepted());
    }
}
