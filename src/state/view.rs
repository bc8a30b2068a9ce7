// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Read-only access to a (partial) embedding.
//!
//! Every algorithm in the engine reads the embedding through [`EmbeddingView`].
//! Two types implement it:
//! - [`EmbeddingState`](super::EmbeddingState), when the caller owns the
//!   canonical state (constructive phase, tests)
//! - [`ManagerView`](super::ManagerView), a read guard on the state held by the
//!   [`EmbeddingManager`](super::EmbeddingManager), used by concurrent preparers
//!
//! The required methods expose the underlying structures; the provided
//! methods are the traversal vocabulary the rest of the engine is written in.

use super::{Chain, Mapping, NeighborCounters};
use crate::graph::cut_vertex::{is_connected_within, is_cut_vertex_within};
use crate::graph::{AdjacencyList, Vertex};
use std::collections::{BTreeSet, HashSet};

/// Read-only view of an embedding. Object safe.
pub trait EmbeddingView {
    /// Adjacency of the source (logical) graph.
    fn source_adjacency(&self) -> &AdjacencyList;

    /// Adjacency of the target (hardware) graph.
    fn target_adjacency(&self) -> &AdjacencyList;

    /// Source vertex -> chain.
    fn mapping(&self) -> &Mapping;

    /// Target vertex -> owning source vertices.
    fn reverse_mapping(&self) -> &Mapping;

    /// Whether `target` is in some chain.
    fn is_occupied(&self, target: Vertex) -> bool;

    /// Target vertices in no chain.
    fn free_target_nodes(&self) -> &BTreeSet<Vertex>;

    /// Source vertices with an empty chain.
    fn remaining_source_nodes(&self) -> &BTreeSet<Vertex>;

    /// Neighbour counters of `source`.
    fn counters(&self, source: Vertex) -> NeighborCounters;

    /// Logical time of the most recent applied change.
    fn clock(&self) -> u64;

    /// Logical time `target` last changed owner or occupancy.
    fn target_stamp(&self, target: Vertex) -> u64;

    /// Logical time the chain of `source` last changed.
    fn source_stamp(&self, source: Vertex) -> u64;

    /// Chain of `source`, if it has one.
    fn chain(&self, source: Vertex) -> Option<&Chain> {
        self.mapping().get(&source)
    }

    /// Number of target vertices in the chain of `source`.
    fn chain_len(&self, source: Vertex) -> usize {
        self.chain(source).map_or(0, BTreeSet::len)
    }

    /// Whether `source` owns at least one target vertex.
    fn is_mapped(&self, source: Vertex) -> bool {
        self.chain(source).is_some_and(|chain| !chain.is_empty())
    }

    /// Source vertices whose chain contains `target`.
    fn owners(&self, target: Vertex) -> Option<&Chain> {
        self.reverse_mapping().get(&target)
    }

    /// Number of chains containing `target`.
    fn overlap(&self, target: Vertex) -> usize {
        self.owners(target).map_or(0, BTreeSet::len)
    }

    /// Heuristic free-neighbour deficit of `source`.
    ///
    /// `2 * needed - max(free, 0)`, where `needed` counts source neighbours
    /// that are not embedded yet.
    fn number_free_neighbors_needed(&self, source: Vertex) -> i64 {
        let counters = self.counters(source);
        let degree = self.source_adjacency().degree(source) as i64;
        let needed = degree - i64::from(counters.embedded);
        2 * needed - counters.free.max(0)
    }

    /// Visit `(chain vertex, neighbour)` for every target neighbour of the
    /// chain of `source` that is not itself in the chain.
    fn for_each_target_neighbor(&self, source: Vertex, visit: &mut dyn FnMut(Vertex, Vertex)) {
        let Some(chain) = self.chain(source) else {
            return;
        };
        for &t in chain {
            for &n in self.target_adjacency().neighbors(t) {
                if !chain.contains(&n) {
                    visit(t, n);
                }
            }
        }
    }

    /// Like [`for_each_target_neighbor`](Self::for_each_target_neighbor), but
    /// skipping occupied neighbours.
    fn for_each_free_target_neighbor(
        &self,
        source: Vertex,
        visit: &mut dyn FnMut(Vertex, Vertex),
    ) {
        self.for_each_target_neighbor(source, &mut |t, n| {
            if !self.is_occupied(n) {
                visit(t, n);
            }
        });
    }

    /// Distinct free target vertices adjacent to the chain of `source`.
    fn free_target_neighbors(&self, source: Vertex) -> BTreeSet<Vertex> {
        let mut free = BTreeSet::new();
        self.for_each_free_target_neighbor(source, &mut |_, n| {
            free.insert(n);
        });
        free
    }

    /// Embedded source neighbours of `source`.
    fn embedded_source_neighbors(&self, source: Vertex) -> Vec<Vertex> {
        let mut seen = HashSet::new();
        self.source_adjacency()
            .neighbors(source)
            .iter()
            .copied()
            .filter(|&u| u != source && self.is_mapped(u) && seen.insert(u))
            .collect()
    }

    /// Whether `target` has a target neighbour in the chain of `source`.
    fn touches_chain(&self, target: Vertex, source: Vertex) -> bool {
        let Some(chain) = self.chain(source) else {
            return false;
        };
        self.target_adjacency()
            .neighbors(target)
            .iter()
            .any(|n| chain.contains(n))
    }

    /// Whether some target edge joins the chains of `a` and `b`.
    fn chains_adjacent(&self, a: Vertex, b: Vertex) -> bool {
        let (Some(chain_a), Some(chain_b)) = (self.chain(a), self.chain(b)) else {
            return false;
        };
        let (small, large) = if chain_a.len() <= chain_b.len() {
            (chain_a, chain_b)
        } else {
            (chain_b, chain_a)
        };
        small.iter().any(|&t| {
            self.target_adjacency()
                .neighbors(t)
                .iter()
                .any(|n| large.contains(n))
        })
    }

    /// Whether the chain of `source` induces a connected target subgraph.
    fn chain_connected(&self, source: Vertex) -> bool {
        self.chain(source)
            .map_or(true, |chain| is_connected_within(self.target_adjacency(), chain))
    }

    /// Whether removing `target` disconnects the chain of `source`.
    fn is_cut_vertex_in_chain(&self, source: Vertex, target: Vertex) -> bool {
        self.chain(source)
            .is_some_and(|chain| is_cut_vertex_within(self.target_adjacency(), chain, target))
    }

    /// Whether removing `target` from the chain of `source` would cut the
    /// chain off from some embedded source neighbour (other than `ignore`).
    fn is_crucial(&self, source: Vertex, target: Vertex, ignore: Option<Vertex>) -> bool {
        let Some(chain) = self.chain(source) else {
            return false;
        };
        if !chain.contains(&target) {
            return false;
        }
        for neighbor in self.embedded_source_neighbors(source) {
            if Some(neighbor) == ignore {
                continue;
            }
            let Some(other) = self.chain(neighbor) else {
                continue;
            };
            let provides = self
                .target_adjacency()
                .neighbors(target)
                .iter()
                .any(|n| other.contains(n));
            if !provides {
                continue;
            }
            let replaced = chain.iter().any(|&t| {
                t != target
                    && self
                        .target_adjacency()
                        .neighbors(t)
                        .iter()
                        .any(|n| other.contains(n))
            });
            if !replaced {
                return true;
            }
        }
        false
    }

    /// Target vertices owned by more than one chain.
    fn overlapping_targets(&self) -> BTreeSet<Vertex> {
        self.reverse_mapping()
            .iter()
            .filter(|(_, owners)| owners.len() > 1)
            .map(|(&t, _)| t)
            .collect()
    }

    /// Whether every chain is connected.
    fn chains_connected(&self) -> bool {
        self.mapping().keys().all(|&s| self.chain_connected(s))
    }

    /// Whether every source edge between embedded vertices is realised by a
    /// target edge.
    fn edges_embedded(&self) -> bool {
        let adjacency = self.source_adjacency();
        adjacency.vertices().all(|a| {
            adjacency
                .neighbors(a)
                .iter()
                .filter(|&&b| a < b && self.is_mapped(a) && self.is_mapped(b))
                .all(|&b| self.chains_adjacent(a, b))
        })
    }

    /// Whether this is a complete minor embedding: every source vertex
    /// mapped, chains connected and disjoint, every source edge realised.
    fn is_valid_embedding(&self) -> bool {
        self.remaining_source_nodes().is_empty()
            && self.source_adjacency().vertices().all(|s| self.is_mapped(s))
            && self.overlapping_targets().is_empty()
            && self.chains_connected()
            && self.edges_embedded()
    }
}
