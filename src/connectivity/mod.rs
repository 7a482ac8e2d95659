//! Reachability over small induced subgraphs
//!
//! The compression rule only ever asks about the handful of occupied nodes
//! around one particle, so adjacency is passed in explicitly rather than
//! read from the full lattice. Ids missing from the adjacency keys are
//! unreachable; dangling neighbor entries are skipped.

use std::collections::VecDeque;
use std::hash::Hash;

use ahash::{AHashMap, AHashSet};

use crate::lattice::{Coord, Port};

/// Node id -> neighboring node ids
pub type Adjacency<T> = AHashMap<T, Vec<T>>;

/// Breadth-first set of ids reachable from `root` (including it)
pub fn reachable_from<T: Copy + Eq + Hash>(adjacency: &Adjacency<T>, root: T) -> AHashSet<T> {
    let mut visited = AHashSet::new();
    if !adjacency.contains_key(&root) {
        return visited;
    }

    let mut queue = VecDeque::from([root]);
    visited.insert(root);
    while let Some(current) = queue.pop_front() {
        for next in adjacency.get(&current).into_iter().flatten() {
            if adjacency.contains_key(next) && visited.insert(*next) {
                queue.push_back(*next);
            }
        }
    }
    visited
}

/// Depth-first variant of [`reachable_from`]; same set, different order
pub fn reachable_from_dfs<T: Copy + Eq + Hash>(adjacency: &Adjacency<T>, root: T) -> AHashSet<T> {
    let mut visited = AHashSet::new();
    if !adjacency.contains_key(&root) {
        return visited;
    }

    let mut stack = vec![root];
    visited.insert(root);
    while let Some(current) = stack.pop() {
        for next in adjacency.get(&current).into_iter().flatten() {
            if adjacency.contains_key(next) && visited.insert(*next) {
                stack.push(*next);
            }
        }
    }
    visited
}

/// True iff every id of `universe` is reachable from `root`
pub fn all_reachable<'a, T, I>(adjacency: &Adjacency<T>, root: T, universe: I) -> bool
where
    T: Copy + Eq + Hash + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let visited = reachable_from(adjacency, root);
    universe.into_iter().all(|id| visited.contains(id))
}

/// True iff the union of traversals from `roots` covers `universe`
pub fn covered_from_any<'a, T, I>(adjacency: &Adjacency<T>, roots: &[T], universe: I) -> bool
where
    T: Copy + Eq + Hash + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut visited = AHashSet::new();
    for root in roots {
        if !visited.contains(root) {
            visited.extend(reachable_from(adjacency, *root));
        }
    }
    universe.into_iter().all(|id| visited.contains(id))
}

/// Lattice adjacency restricted to `coords`
pub fn induced_adjacency(coords: &AHashSet<Coord>) -> Adjacency<Coord> {
    coords
        .iter()
        .map(|coord| {
            let linked = Port::ALL
                .iter()
                .map(|port| coord.neighbor(*port))
                .filter(|n| coords.contains(n))
                .collect();
            (*coord, linked)
        })
        .collect()
}

/// True iff `coords` is non-empty and forms one lattice-connected piece
pub fn is_connected(coords: &AHashSet<Coord>) -> bool {
    let Some(root) = coords.iter().next() else {
        return false;
    };
    let adjacency = induced_adjacency(coords);
    reachable_from_dfs(&adjacency, *root).len() == coords.len()
}
