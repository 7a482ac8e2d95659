//! Per-node mutual exclusion over the shared node environment
//!
//! `RegionLock` owns a fixed set of stripes; a node maps to the stripe
//! `handle % stripes`. A worker locks the stripes of every node its
//! particle may read or write, always in ascending stripe order, so two
//! workers whose regions share no stripe act in parallel and no cycle of
//! waiters can form. The guard releases every stripe on drop, including on
//! `?` exits.
//!
//! An optional `HoldRecorder` records every hold with the nodes it covered, so
//! tests can check that no node was ever held twice at once and that
//! disjoint holds really did overlap in time.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use ahash::AHashSet;

use crate::core::error::{Result, SimError};
use crate::core::types::NodeHandle;

/// Default number of stripes for a run
pub const DEFAULT_STRIPES: usize = 1024;

/// One recorded hold, relative to the recorder's creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldInterval {
    pub start: Duration,
    pub end: Duration,
    /// Sorted, deduplicated
    pub nodes: Vec<NodeHandle>,
}

impl HoldInterval {
    fn shares_node(&self, other: &HoldInterval) -> bool {
        self.nodes.iter().any(|n| other.nodes.binary_search(n).is_ok())
    }
}

#[derive(Debug)]
pub struct HoldRecorder {
    origin: Instant,
    active: AtomicUsize,
    concurrent: AtomicUsize,
    conflicts: AtomicUsize,
    held: Mutex<AHashSet<NodeHandle>>,
    holds: Mutex<Vec<HoldInterval>>,
}

impl Default for HoldRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldRecorder {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            active: AtomicUsize::new(0),
            concurrent: AtomicUsize::new(0),
            conflicts: AtomicUsize::new(0),
            held: Mutex::new(AHashSet::new()),
            holds: Mutex::new(Vec::new()),
        }
    }

    fn enter(&self, nodes: &[NodeHandle]) -> Duration {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.concurrent.fetch_add(1, Ordering::SeqCst);
        }
        if let Ok(mut held) = self.held.lock() {
            let clashes = nodes.iter().filter(|n| !held.insert(**n)).count();
            self.conflicts.fetch_add(clashes, Ordering::SeqCst);
        }
        self.origin.elapsed()
    }

    fn exit(&self, nodes: Vec<NodeHandle>, start: Duration) {
        let end = self.origin.elapsed();
        if let Ok(mut held) = self.held.lock() {
            for node in &nodes {
                held.remove(node);
            }
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        if let Ok(mut holds) = self.holds.lock() {
            holds.push(HoldInterval { start, end, nodes });
        }
    }

    /// Nodes found already held by another guard when a hold began
    pub fn conflict_count(&self) -> usize {
        self.conflicts.load(Ordering::SeqCst)
    }

    /// Holds that began while at least one other hold was active
    pub fn concurrent_count(&self) -> usize {
        self.concurrent.load(Ordering::SeqCst)
    }

    pub fn hold_count(&self) -> usize {
        self.holds.lock().map(|h| h.len()).unwrap_or(0)
    }

    /// Recorded intervals sorted by start time
    pub fn intervals(&self) -> Vec<HoldInterval> {
        let mut holds = self.holds.lock().map(|h| h.clone()).unwrap_or_default();
        holds.sort_by_key(|h| h.start);
        holds
    }

    /// Pairs of holds that overlapped in time and covered a common node
    pub fn conflicting_intervals(&self) -> Vec<(HoldInterval, HoldInterval)> {
        let holds = self.intervals();
        let mut pairs = Vec::new();
        for (i, first) in holds.iter().enumerate() {
            for second in holds[i + 1..].iter().take_while(|h| h.start < first.end) {
                if first.shares_node(second) {
                    pairs.push((first.clone(), second.clone()));
                }
            }
        }
        pairs
    }
}

pub struct RegionLock {
    stripes: Vec<Mutex<()>>,
    recorder: Option<Arc<HoldRecorder>>,
}

impl RegionLock {
    pub fn new(stripes: usize) -> Self {
        Self {
            stripes: (0..stripes.max(1)).map(|_| Mutex::new(())).collect(),
            recorder: None,
        }
    }

    pub fn with_recorder(stripes: usize, recorder: Arc<HoldRecorder>) -> Self {
        Self {
            recorder: Some(recorder),
            ..Self::new(stripes)
        }
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    pub fn stripe_of(&self, node: NodeHandle) -> usize {
        node.index() % self.stripes.len()
    }

    /// Block until every stripe covering `nodes` is free
    pub fn acquire(&self, nodes: &[NodeHandle]) -> Result<RegionGuard<'_>> {
        let mut stripes: Vec<usize> = nodes.iter().map(|n| self.stripe_of(*n)).collect();
        stripes.sort_unstable();
        stripes.dedup();

        let mut guards = Vec::with_capacity(stripes.len());
        for stripe in stripes {
            guards.push(self.stripes[stripe].lock().map_err(|_| SimError::LockPoisoned)?);
        }

        let mut nodes = nodes.to_vec();
        nodes.sort_unstable();
        nodes.dedup();
        let hold = self.recorder.as_deref().map(|recorder| (recorder, recorder.enter(&nodes)));
        Ok(RegionGuard {
            nodes,
            hold,
            _stripes: guards,
        })
    }
}

pub struct RegionGuard<'a> {
    nodes: Vec<NodeHandle>,
    hold: Option<(&'a HoldRecorder, Duration)>,
    _stripes: Vec<MutexGuard<'a, ()>>,
}

impl RegionGuard<'_> {
    pub fn covers(&self, node: NodeHandle) -> bool {
        self.nodes.binary_search(&node).is_ok()
    }

    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }
}

impl Drop for RegionGuard<'_> {
    // Runs before the stripe guards are dropped, so the hold ends while
    // every stripe is still owned.
    fn drop(&mut self) {
        if let Some((recorder, start)) = self.hold.take() {
            recorder.exit(std::mem::take(&mut self.nodes), start);
        }
    }
}
