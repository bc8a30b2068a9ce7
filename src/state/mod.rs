// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The partial embedding.
//!
//! [`EmbeddingState`] owns the canonical data of one embedding run:
//! - the source and target adjacency
//! - the mapping (source -> chain) and its transpose (target -> owners)
//! - the occupied/free partition of the target vertices
//! - the source vertices still without a chain
//! - per-source neighbour counters
//! - a logical change history used to detect stale plans
//!
//! Only one thread writes it. Concurrent components stage edits through the
//! [`EmbeddingManager`], which replays them here on `synchronize()`.

pub mod change;
pub mod manager;
pub mod view;

pub use change::{ChangeLog, EmbeddingChange};
pub use manager::{
    CandidateCache, CandidateList, EmbeddingManager, ManagerView, MutationSink, NoCandidateCache,
};
pub use view::EmbeddingView;

use crate::error::{EmbeddingError, Result};
use crate::graph::{AdjacencyList, Graph, Vertex};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// The target vertices of one source vertex (its super-vertex).
pub type Chain = BTreeSet<Vertex>;

/// Source vertex -> chain, or (reversed) target vertex -> owners.
pub type Mapping = BTreeMap<Vertex, Chain>;

/// Per-source-vertex counters driving placement and mutation priorities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeighborCounters {
    /// Source neighbours that own a chain.
    pub embedded: u32,
    /// Distinct free target vertices adjacent to the chain.
    pub free: i64,
}

/// Logical timestamps of the last change to each vertex.
#[derive(Debug, Clone, Default)]
struct ChangeHistory {
    clock: u64,
    targets: HashMap<Vertex, u64>,
    sources: HashMap<Vertex, u64>,
}

impl ChangeHistory {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn stamp_target(&mut self, target: Vertex) {
        let now = self.tick();
        self.targets.insert(target, now);
    }

    fn stamp_source(&mut self, source: Vertex) {
        let now = self.tick();
        self.sources.insert(source, now);
    }
}

/// Canonical embedding data. See the module docs.
#[derive(Debug, Clone)]
pub struct EmbeddingState {
    source_adjacency: AdjacencyList,
    target_adjacency: AdjacencyList,
    mapping: Mapping,
    reverse: Mapping,
    occupied: HashSet<Vertex>,
    free_targets: BTreeSet<Vertex>,
    remaining_sources: BTreeSet<Vertex>,
    counters: HashMap<Vertex, NeighborCounters>,
    history: ChangeHistory,
    // Sources whose counters must be recomputed before the next read
    dirty: BTreeSet<Vertex>,
}

fn reject_self_loops(graph: &Graph) -> Result<()> {
    match graph.iter().find(|edge| edge.is_self_loop()) {
        Some(edge) => Err(EmbeddingError::SelfLoop { vertex: edge.u() }),
        None => Ok(()),
    }
}

impl EmbeddingState {
    /// Create an empty embedding of `source` into `target`.
    ///
    /// # Errors
    ///
    /// `EmptyGraph` if either graph has no edges, `SelfLoop` if either graph
    /// contains one.
    pub fn new(source: &Graph, target: &Graph) -> Result<Self> {
        if source.is_empty() {
            return Err(EmbeddingError::EmptyGraph { role: "source" });
        }
        if target.is_empty() {
            return Err(EmbeddingError::EmptyGraph { role: "target" });
        }
        reject_self_loops(source)?;
        reject_self_loops(target)?;

        let source_adjacency = AdjacencyList::from_graph(source);
        let target_adjacency = AdjacencyList::from_graph(target);
        let free_targets = target_adjacency.vertices().collect();
        let remaining_sources: BTreeSet<Vertex> = source_adjacency.vertices().collect();
        let counters = remaining_sources
            .iter()
            .map(|&s| (s, NeighborCounters::default()))
            .collect();

        Ok(Self {
            source_adjacency,
            target_adjacency,
            mapping: Mapping::new(),
            reverse: Mapping::new(),
            occupied: HashSet::new(),
            free_targets,
            remaining_sources,
            counters,
            history: ChangeHistory::default(),
            dirty: BTreeSet::new(),
        })
    }

    fn check_source(&self, source: Vertex) -> Result<()> {
        if self.source_adjacency.contains_vertex(source) {
            Ok(())
        } else {
            Err(EmbeddingError::UnknownVertex { vertex: source })
        }
    }

    fn check_target(&self, target: Vertex) -> Result<()> {
        if self.target_adjacency.contains_vertex(target) {
            Ok(())
        } else {
            Err(EmbeddingError::UnknownVertex { vertex: target })
        }
    }

    /// Add `target` to the chain of `source`.
    ///
    /// # Errors
    ///
    /// `UnknownVertex` if either vertex is not in its graph.
    pub fn map_node(&mut self, source: Vertex, target: Vertex) -> Result<()> {
        self.check_source(source)?;
        self.check_target(target)?;
        self.apply(EmbeddingChange::InsertMappingPair { source, target });
        self.refresh_counters();
        Ok(())
    }

    /// Add every vertex of `chain` to the chain of `source`.
    ///
    /// # Errors
    ///
    /// `UnknownVertex` if any vertex is not in its graph; nothing is applied
    /// in that case.
    pub fn map_node_to_chain(&mut self, source: Vertex, chain: &Chain) -> Result<()> {
        self.check_source(source)?;
        for &target in chain {
            self.check_target(target)?;
        }
        for &target in chain {
            self.apply(EmbeddingChange::InsertMappingPair { source, target });
        }
        self.refresh_counters();
        Ok(())
    }

    /// Remove the whole chain of `source`, freeing targets nobody else owns.
    ///
    /// # Errors
    ///
    /// `UnknownVertex` if `source` is not a source vertex.
    pub fn unmap_node(&mut self, source: Vertex) -> Result<Chain> {
        self.check_source(source)?;
        let chain = self.mapping.get(&source).cloned().unwrap_or_default();
        for &target in &chain {
            self.apply(EmbeddingChange::DeleteMappingPair { source, target });
            self.apply(EmbeddingChange::FreeNode { target });
        }
        self.refresh_counters();
        Ok(chain)
    }

    /// Apply a batch of changes and refresh the affected counters.
    pub fn apply_all<I>(&mut self, changes: I) -> usize
    where
        I: IntoIterator<Item = EmbeddingChange>,
    {
        let mut applied = 0;
        for change in changes {
            self.apply(change);
            applied += 1;
        }
        self.refresh_counters();
        applied
    }

    /// Apply one change. Counters of affected sources are only marked stale;
    /// call [`refresh_counters`](Self::refresh_counters) once the batch is in.
    pub fn apply(&mut self, change: EmbeddingChange) {
        match change {
            EmbeddingChange::InsertMappingPair { source, target } => {
                let chain = self.mapping.entry(source).or_default();
                let was_empty = chain.is_empty();
                if !chain.insert(target) {
                    return;
                }
                self.reverse.entry(target).or_default().insert(source);
                if was_empty {
                    self.remaining_sources.remove(&source);
                    self.dirty_source_neighbors(source);
                }
                self.dirty.insert(source);
                self.history.stamp_source(source);
                self.history.stamp_target(target);
                // A mapped target is always occupied
                self.occupy(target);
            }
            EmbeddingChange::DeleteMappingPair { source, target } => {
                let Some(chain) = self.mapping.get_mut(&source) else {
                    return;
                };
                if !chain.remove(&target) {
                    return;
                }
                if chain.is_empty() {
                    self.mapping.remove(&source);
                    self.remaining_sources.insert(source);
                    self.dirty_source_neighbors(source);
                }
                if let Some(owners) = self.reverse.get_mut(&target) {
                    owners.remove(&source);
                    if owners.is_empty() {
                        self.reverse.remove(&target);
                    }
                }
                self.dirty.insert(source);
                self.history.stamp_source(source);
                self.history.stamp_target(target);
            }
            EmbeddingChange::SetFreeNeighbors { source, count } => {
                self.counters.entry(source).or_default().free = count;
                self.dirty.remove(&source);
                self.history.stamp_source(source);
            }
            EmbeddingChange::OccupyNode { target } => self.occupy(target),
            EmbeddingChange::FreeNode { target } => {
                if self.reverse.contains_key(&target) || !self.occupied.remove(&target) {
                    return;
                }
                self.free_targets.insert(target);
                self.dirty_target_neighbors(target);
                self.history.stamp_target(target);
            }
            EmbeddingChange::Commit => {}
        }
    }

    fn occupy(&mut self, target: Vertex) {
        if !self.occupied.insert(target) {
            return;
        }
        self.free_targets.remove(&target);
        self.dirty_target_neighbors(target);
        self.history.stamp_target(target);
    }

    fn dirty_source_neighbors(&mut self, source: Vertex) {
        for &neighbor in self.source_adjacency.neighbors(source) {
            self.dirty.insert(neighbor);
        }
    }

    fn dirty_target_neighbors(&mut self, target: Vertex) {
        for &neighbor in self.target_adjacency.neighbors(target) {
            if let Some(owners) = self.reverse.get(&neighbor) {
                self.dirty.extend(owners.iter().copied());
            }
        }
    }

    /// Recompute the counters of every source touched since the last refresh.
    pub fn refresh_counters(&mut self) {
        let dirty = std::mem::take(&mut self.dirty);
        for source in dirty {
            let counters = NeighborCounters {
                embedded: self.embedded_source_neighbors(source).len() as u32,
                free: self.free_target_neighbors(source).len() as i64,
            };
            self.counters.insert(source, counters);
        }
    }

    /// Consume the state, keeping only the mapping.
    pub fn into_mapping(self) -> Mapping {
        self.mapping
    }

    /// Check the structural invariants tying the redundant structures
    /// together. Intended for tests and debug assertions.
    pub fn check_invariants(&self) -> bool {
        let transpose_ok = self.mapping.iter().all(|(s, chain)| {
            !chain.is_empty()
                && chain
                    .iter()
                    .all(|t| self.reverse.get(t).is_some_and(|o| o.contains(s)))
        }) && self.reverse.iter().all(|(t, owners)| {
            !owners.is_empty()
                && owners
                    .iter()
                    .all(|s| self.mapping.get(s).is_some_and(|c| c.contains(t)))
        });

        let partition_ok = self.target_adjacency.vertices().all(|t| {
            self.occupied.contains(&t) != self.free_targets.contains(&t)
        }) && self.occupied.len() + self.free_targets.len() == self.target_adjacency.len()
            && self.reverse.keys().all(|t| self.occupied.contains(t));

        let remaining_ok = self
            .source_adjacency
            .vertices()
            .all(|s| self.remaining_sources.contains(&s) != self.is_mapped(s));

        let counters_ok = self.dirty.is_empty()
            && self.source_adjacency.vertices().all(|s| {
                self.counters(s).embedded as usize == self.embedded_source_neighbors(s).len()
            });

        transpose_ok && partition_ok && remaining_ok && counters_ok
    }
}

impl EmbeddingView for EmbeddingState {
    fn source_adjacency(&self) -> &AdjacencyList {
        &self.source_adjacency
    }

    fn target_adjacency(&self) -> &AdjacencyList {
        &self.target_adjacency
    }

    fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    fn reverse_mapping(&self) -> &Mapping {
        &self.reverse
    }

    fn is_occupied(&self, target: Vertex) -> bool {
        self.occupied.contains(&target)
    }

    fn free_target_nodes(&self) -> &BTreeSet<Vertex> {
        &self.free_targets
    }

    fn remaining_source_nodes(&self) -> &BTreeSet<Vertex> {
        &self.remaining_sources
    }

    fn counters(&self, source: Vertex) -> NeighborCounters {
        self.counters.get(&source).copied().unwrap_or_default()
    }

    fn clock(&self) -> u64 {
        self.history.clock
    }

    fn target_stamp(&self, target: Vertex) -> u64 {
        self.history.targets.get(&target).copied().unwrap_or(0)
    }

    fn source_stamp(&self, source: Vertex) -> u64 {
        self.history.sources.get(&source).copied().unwrap_or(0)
    }
}
