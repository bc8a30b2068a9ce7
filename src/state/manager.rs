// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Shared access to the embedding for concurrent refinement.
//!
//! The [`EmbeddingManager`] wraps the canonical [`EmbeddingState`] in a
//! read-write lock. Readers take a [`ManagerView`]; writers never touch the
//! state directly but stage edits through [`MutationSink`], and the single
//! incorporating thread replays them with [`synchronize`](EmbeddingManager::synchronize).

use super::change::{ChangeLog, EmbeddingChange};
use super::view::EmbeddingView;
use super::{Chain, EmbeddingState, Mapping, NeighborCounters};
use crate::graph::{AdjacencyList, Vertex};
use log::trace;
use lru::LruCache;
use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::BTreeSet;
use std::num::NonZeroUsize;

/// The narrow write capability handed to mutations.
///
/// Edits are buffered; nothing is visible to readers until the owner of the
/// state synchronizes past the matching [`commit`](Self::commit).
pub trait MutationSink {
    fn insert_mapping_pair(&self, source: Vertex, target: Vertex);
    fn delete_mapping_pair(&self, source: Vertex, target: Vertex);
    fn occupy_node(&self, target: Vertex);
    /// Free `target` unless some chain still owns it once applied.
    fn free_node(&self, target: Vertex);
    fn set_free_neighbors(&self, source: Vertex, count: i64);
    fn commit(&self);

    /// Stage the edits turning the current chain of `source` (as seen by
    /// `view`) into `chain`. Does not commit.
    fn replace_chain(&self, view: &dyn EmbeddingView, source: Vertex, chain: &Chain) {
        let current = view.chain(source).cloned().unwrap_or_default();
        for &target in current.difference(chain) {
            self.delete_mapping_pair(source, target);
            self.free_node(target);
        }
        for &target in chain.difference(&current) {
            self.insert_mapping_pair(source, target);
            self.occupy_node(target);
        }
    }
}

/// Frontier-shifting candidates computed for one conqueror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateList {
    /// Logical clock of the state the list was computed from.
    pub clock: u64,
    /// Contested target vertices.
    pub targets: Vec<Vertex>,
}

/// Frontier-shifting candidates remembered across mutation rounds.
///
/// Entries may be stale; users check them against the live state.
pub trait CandidateCache {
    /// Cached candidates for `conqueror`, without touching recency.
    fn cached_candidates(&self, conqueror: Vertex) -> Option<CandidateList>;

    /// Remember candidates for `conqueror`, evicting the least recently stored.
    fn store_candidates(&self, conqueror: Vertex, candidates: CandidateList);
}

/// A cache that remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCandidateCache;

impl CandidateCache for NoCandidateCache {
    fn cached_candidates(&self, _conqueror: Vertex) -> Option<CandidateList> {
        None
    }

    fn store_candidates(&self, _conqueror: Vertex, _candidates: CandidateList) {}
}

/// Owner of the canonical state during concurrent refinement.
#[derive(Debug)]
pub struct EmbeddingManager {
    state: RwLock<EmbeddingState>,
    changes: ChangeLog,
    // None when the configured capacity is 0
    candidates: Option<RwLock<LruCache<Vertex, CandidateList>>>,
}

impl EmbeddingManager {
    /// Take ownership of `state`. A `cache_capacity` of 0 disables the
    /// candidate cache.
    pub fn new(state: EmbeddingState, cache_capacity: usize) -> Self {
        Self {
            state: RwLock::new(state),
            changes: ChangeLog::new(),
            candidates: NonZeroUsize::new(cache_capacity).map(|n| RwLock::new(LruCache::new(n))),
        }
    }

    /// Read access to the canonical state.
    ///
    /// Do not hold a view across a call to [`synchronize`](Self::synchronize)
    /// on the same thread.
    pub fn view(&self) -> ManagerView<'_> {
        ManagerView {
            guard: self.state.read(),
        }
    }

    /// Direct access for the single-threaded phases.
    pub fn state_mut(&mut self) -> &mut EmbeddingState {
        self.state.get_mut()
    }

    /// Give the state back, dropping uncommitted changes.
    pub fn into_state(self) -> EmbeddingState {
        self.state.into_inner()
    }

    /// Number of commits staged but not yet synchronized.
    pub fn pending_commits(&self) -> usize {
        self.changes.pending_commits()
    }

    /// Replay every committed change into the canonical state.
    ///
    /// Takes the write lock, so it waits for outstanding views. Returns the
    /// number of changes applied.
    pub fn synchronize(&self) -> usize {
        if self.changes.pending_commits() == 0 {
            return 0;
        }
        let mut state = self.state.write();
        let applied = self.changes.drain(|change| state.apply(change));
        state.refresh_counters();
        trace!("synchronized {} changes at clock {}", applied, state.clock());
        applied
    }
}

impl CandidateCache for EmbeddingManager {
    fn cached_candidates(&self, conqueror: Vertex) -> Option<CandidateList> {
        self.candidates
            .as_ref()
            .and_then(|cache| cache.read().peek(&conqueror).cloned())
    }

    fn store_candidates(&self, conqueror: Vertex, candidates: CandidateList) {
        if let Some(cache) = &self.candidates {
            cache.write().put(conqueror, candidates);
        }
    }
}

impl MutationSink for EmbeddingManager {
    fn insert_mapping_pair(&self, source: Vertex, target: Vertex) {
        self.changes
            .push(EmbeddingChange::InsertMappingPair { source, target });
    }

    fn delete_mapping_pair(&self, source: Vertex, target: Vertex) {
        self.changes
            .push(EmbeddingChange::DeleteMappingPair { source, target });
    }

    fn occupy_node(&self, target: Vertex) {
        self.changes.push(EmbeddingChange::OccupyNode { target });
    }

    fn free_node(&self, target: Vertex) {
        self.changes.push(EmbeddingChange::FreeNode { target });
    }

    fn set_free_neighbors(&self, source: Vertex, count: i64) {
        self.changes
            .push(EmbeddingChange::SetFreeNeighbors { source, count });
    }

    fn commit(&self) {
        self.changes.commit();
    }
}

/// A read guard on the managed state.
pub struct ManagerView<'a> {
    guard: RwLockReadGuard<'a, EmbeddingState>,
}

impl EmbeddingView for ManagerView<'_> {
    fn source_adjacency(&self) -> &AdjacencyList {
        self.guard.source_adjacency()
    }

    fn target_adjacency(&self) -> &AdjacencyList {
        self.guard.target_adjacency()
    }

    fn mapping(&self) -> &Mapping {
        self.guard.mapping()
    }

    fn reverse_mapping(&self) -> &Mapping {
        self.guard.reverse_mapping()
    }

    fn is_occupied(&self, target: Vertex) -> bool {
        self.guard.is_occupied(target)
    }

    fn free_target_nodes(&self) -> &BTreeSet<Vertex> {
        self.guard.free_target_nodes()
    }

    fn remaining_source_nodes(&self) -> &BTreeSet<Vertex> {
        self.guard.remaining_source_nodes()
    }

    fn counters(&self, source: Vertex) -> NeighborCounters {
        self.guard.counters(source)
    }

    fn clock(&self) -> u64 {
        self.guard.clock()
    }

    fn target_stamp(&self, target: Vertex) -> u64 {
        self.guard.target_stamp(target)
    }

    fn source_stamp(&self, source: Vertex) -> u64 {
        self.guard.source_stamp(source)
    }
}
