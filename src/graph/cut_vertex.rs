// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Cut-vertex (articulation point) detection.
//!
//! Chains are small but their size is not under our control, so every search
//! here uses an explicit stack rather than recursion.
//!
//! # Algorithm
//!
//! [`identify_cut_vertices`] is Tarjan's articulation point algorithm:
//! 1. DFS from an arbitrary root, assigning discovery times
//! 2. `low[v]` = smallest discovery time reachable from the subtree of `v`
//!    using at most one back edge
//! 3. A non-root `p` is a cut vertex iff some child `c` has `low[c] >= disc[p]`
//! 4. The root is a cut vertex iff it has more than one DFS child
//!
//! Both public entry points treat a disconnected or self-looping input as a
//! contract violation.

use super::{AdjacencyList, Vertex, UNDEFINED_NODE};
use crate::error::{EmbeddingError, Result};
use std::collections::{BTreeSet, HashMap, HashSet};

/// One level of the explicit DFS stack.
#[derive(Debug)]
struct Frame {
    vertex: Vertex,
    parent: Vertex,
    next_neighbor: usize,
}

/// Identify every articulation point of a connected subgraph with `n` vertices.
///
/// # Errors
///
/// - `DisconnectedSubgraph` if the DFS does not reach exactly `n` vertices
/// - `SelfLoop` if an edge from a vertex to itself is encountered
pub fn identify_cut_vertices(subgraph: &AdjacencyList, n: usize) -> Result<BTreeSet<Vertex>> {
    let mut cut = BTreeSet::new();
    let Some(root) = subgraph.vertices().next() else {
        if n == 0 {
            return Ok(cut);
        }
        return Err(EmbeddingError::DisconnectedSubgraph {
            visited: 0,
            expected: n,
        });
    };

    let mut discovery: HashMap<Vertex, usize> = HashMap::with_capacity(n);
    let mut low: HashMap<Vertex, usize> = HashMap::with_capacity(n);
    let mut time = 0;
    let mut root_children = 0;

    discovery.insert(root, time);
    low.insert(root, time);
    let mut stack = vec![Frame {
        vertex: root,
        parent: UNDEFINED_NODE,
        next_neighbor: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let v = frame.vertex;
        let neighbors = subgraph.neighbors(v);

        if frame.next_neighbor < neighbors.len() {
            let w = neighbors[frame.next_neighbor];
            frame.next_neighbor += 1;

            if w == v {
                return Err(EmbeddingError::SelfLoop { vertex: v });
            }
            if w == frame.parent {
                continue;
            }

            match discovery.get(&w).copied() {
                Some(disc_w) => {
                    // Back edge
                    let low_v = low.entry(v).or_insert(disc_w);
                    *low_v = (*low_v).min(disc_w);
                }
                None => {
                    time += 1;
                    discovery.insert(w, time);
                    low.insert(w, time);
                    if v == root {
                        root_children += 1;
                    }
                    stack.push(Frame {
                        vertex: w,
                        parent: v,
                        next_neighbor: 0,
                    });
                }
            }
        } else {
            stack.pop();
            if let Some(parent_frame) = stack.last() {
                let p = parent_frame.vertex;
                let low_v = low[&v];
                let low_p = low.entry(p).or_insert(low_v);
                *low_p = (*low_p).min(low_v);
                if p != root && low_v >= discovery[&p] {
                    cut.insert(p);
                }
            }
        }
    }

    if discovery.len() != n {
        return Err(EmbeddingError::DisconnectedSubgraph {
            visited: discovery.len(),
            expected: n,
        });
    }

    if root_children > 1 {
        cut.insert(root);
    }

    Ok(cut)
}

/// Whether removing `node` disconnects a connected subgraph with `n` vertices.
///
/// Runs a DFS from the first neighbour of `node` with `node` itself marked as
/// already visited; `node` is a cut vertex iff fewer than `n` vertices are
/// reached.
///
/// # Errors
///
/// `SelfLoop` if the first neighbour of `node` is `node` itself.
pub fn is_cut_vertex(subgraph: &AdjacencyList, node: Vertex, n: usize) -> Result<bool> {
    let Some(&start) = subgraph.neighbors(node).first() else {
        return Ok(false);
    };
    if start == node {
        return Err(EmbeddingError::SelfLoop { vertex: node });
    }

    let mut visited: HashSet<Vertex> = HashSet::with_capacity(n);
    visited.insert(node);
    visited.insert(start);
    let mut stack = vec![start];
    while let Some(v) = stack.pop() {
        for &w in subgraph.neighbors(v) {
            if visited.insert(w) {
                stack.push(w);
            }
        }
    }

    Ok(visited.len() < n)
}

/// Whether removing `node` disconnects the subgraph of `adjacency` induced on
/// `members`.
///
/// Used for chains, where the induced subgraph is never materialised. Returns
/// false if `node` is not a member or if fewer than three members exist.
pub fn is_cut_vertex_within(
    adjacency: &AdjacencyList,
    members: &BTreeSet<Vertex>,
    node: Vertex,
) -> bool {
    if members.len() < 3 || !members.contains(&node) {
        return false;
    }
    let Some(start) = adjacency
        .neighbors(node)
        .iter()
        .copied()
        .find(|w| *w != node && members.contains(w))
    else {
        // Isolated inside the chain: removing it cannot disconnect the rest
        // any further.
        return false;
    };

    let mut visited: HashSet<Vertex> = HashSet::with_capacity(members.len());
    visited.insert(node);
    visited.insert(start);
    let mut stack = vec![start];
    while let Some(v) = stack.pop() {
        for &w in adjacency.neighbors(v) {
            if members.contains(&w) && visited.insert(w) {
                stack.push(w);
            }
        }
    }

    visited.len() < members.len()
}

/// Whether the subgraph of `adjacency` induced on `members` is connected.
///
/// The empty set is considered connected.
pub fn is_connected_within(adjacency: &AdjacencyList, members: &BTreeSet<Vertex>) -> bool {
    let Some(&start) = members.iter().next() else {
        return true;
    };
    connected_component_within(adjacency, members, start).len() == members.len()
}

/// The connected component of `start` in the subgraph induced on `members`.
pub fn connected_component_within(
    adjacency: &AdjacencyList,
    members: &BTreeSet<Vertex>,
    start: Vertex,
) -> BTreeSet<Vertex> {
    let mut component = BTreeSet::new();
    if !members.contains(&start) {
        return component;
    }
    component.insert(start);
    let mut stack = vec![start];
    while let Some(v) = stack.pop() {
        for &w in adjacency.neighbors(v) {
            if members.contains(&w) && component.insert(w) {
                stack.push(w);
            }
        }
    }
    component
}
