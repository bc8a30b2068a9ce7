// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Local search that reshapes one chain.
//!
//! The reducer takes a snapshot of one source vertex's neighbourhood and
//! searches for a chain that shares fewer target vertices with other chains,
//! or failing that is shorter, while keeping the chain connected and keeping
//! a target edge to every neighbour chain the original touched.
//!
//! The snapshot makes the reducer independent of the live state, so it can be
//! prepared on any thread. [`SuperVertexReducer::remains_valid`] checks the
//! result against the live state again before it is applied.

use crate::graph::cut_vertex::{is_connected_within, is_cut_vertex_within};
use crate::graph::{AdjacencyList, Vertex};
use crate::state::{Chain, EmbeddingView};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::{BTreeSet, HashMap};

/// Score of a chain; smaller is better. Compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fitness {
    /// Vertices shared with some other chain.
    pub bad: usize,
    /// Chain length.
    pub size: usize,
}

/// Overlap-reducing local search for one chain.
#[derive(Debug, Clone)]
pub struct SuperVertexReducer {
    node: Vertex,
    initial: Chain,
    current: Chain,
    best: Chain,
    pool: Vec<Vertex>,
    // Target adjacency induced on the pool
    local: AdjacencyList,
    // Other chains owning each pool vertex
    others: HashMap<Vertex, usize>,
    // Neighbour sources each pool vertex provides an edge to
    connections: HashMap<Vertex, Vec<Vertex>>,
    // Current chain vertices providing an edge to each neighbour source
    source_connections: HashMap<Vertex, usize>,
    required: BTreeSet<Vertex>,
    iteration_factor: usize,
}

impl SuperVertexReducer {
    /// Snapshot the neighbourhood of `node`'s chain.
    pub fn new(view: &dyn EmbeddingView, node: Vertex, iteration_factor: usize) -> Self {
        let initial = view.chain(node).cloned().unwrap_or_default();

        let mut pool_set: BTreeSet<Vertex> = initial.clone();
        view.for_each_target_neighbor(node, &mut |_, n| {
            pool_set.insert(n);
        });
        let pool: Vec<Vertex> = pool_set.iter().copied().collect();

        let mut local = AdjacencyList::new();
        for &t in &pool {
            local.insert_vertex(t);
            for &n in view.target_adjacency().neighbors(t) {
                if pool_set.contains(&n) {
                    local.insert_arc(t, n);
                }
            }
        }

        let others = pool
            .iter()
            .map(|&t| {
                let owned = view.owners(t).map_or(0, |owners| {
                    owners.len() - usize::from(owners.contains(&node))
                });
                (t, owned)
            })
            .collect();

        let neighbors = view.embedded_source_neighbors(node);
        let connections: HashMap<Vertex, Vec<Vertex>> = pool
            .iter()
            .map(|&t| {
                let provided = neighbors
                    .iter()
                    .copied()
                    .filter(|&n| view.touches_chain(t, n))
                    .collect();
                (t, provided)
            })
            .collect();
        let required = initial
            .iter()
            .flat_map(|t| connections.get(t).into_iter().flatten().copied())
            .collect();

        let mut reducer = Self {
            node,
            initial: initial.clone(),
            current: Chain::new(),
            best: initial.clone(),
            pool,
            local,
            others,
            connections,
            source_connections: HashMap::new(),
            required,
            iteration_factor,
        };
        reducer.reset_to(initial);
        reducer
    }

    pub fn node(&self) -> Vertex {
        self.node
    }

    pub fn initial(&self) -> &Chain {
        &self.initial
    }

    /// Best chain found so far.
    pub fn best(&self) -> &Chain {
        &self.best
    }

    /// Neighbour sources the chain must keep touching.
    pub fn required(&self) -> &BTreeSet<Vertex> {
        &self.required
    }

    /// Score `chain` against the snapshot.
    pub fn fitness(&self, chain: &Chain) -> Fitness {
        Fitness {
            bad: chain.iter().filter(|t| self.is_bad(**t)).count(),
            size: chain.len(),
        }
    }

    /// Whether the best chain scores strictly better than the initial one.
    pub fn improved(&self) -> bool {
        self.fitness(&self.best) < self.fitness(&self.initial)
    }

    fn is_bad(&self, target: Vertex) -> bool {
        self.others.get(&target).copied().unwrap_or(0) > 0
    }

    fn reset_to(&mut self, chain: Chain) {
        self.source_connections.clear();
        for t in &chain {
            for &n in self.connections.get(t).into_iter().flatten() {
                *self.source_connections.entry(n).or_default() += 1;
            }
        }
        self.current = chain;
    }

    fn provides_only_connection(&self, target: Vertex) -> bool {
        self.connections
            .get(&target)
            .into_iter()
            .flatten()
            .any(|n| {
                self.required.contains(n)
                    && self.source_connections.get(n).copied().unwrap_or(0) <= 1
            })
    }

    /// Whether `target` can leave the current chain.
    fn is_removable(&self, target: Vertex) -> bool {
        self.current.len() > 1
            && self.current.contains(&target)
            && !self.provides_only_connection(target)
            && !is_cut_vertex_within(&self.local, &self.current, target)
    }

    /// Whether `target` can join the current chain.
    fn is_addable(&self, target: Vertex) -> bool {
        !self.current.contains(&target)
            && !self.is_bad(target)
            && self
                .local
                .neighbors(target)
                .iter()
                .any(|n| self.current.contains(n))
    }

    fn add(&mut self, target: Vertex) {
        for &n in self.connections.get(&target).into_iter().flatten() {
            *self.source_connections.entry(n).or_default() += 1;
        }
        self.current.insert(target);
    }

    fn remove(&mut self, target: Vertex) {
        for &n in self.connections.get(&target).into_iter().flatten() {
            if let Some(count) = self.source_connections.get_mut(&n) {
                *count = count.saturating_sub(1);
            }
        }
        self.current.remove(&target);
    }

    fn record_best(&mut self) {
        if self.fitness(&self.current) < self.fitness(&self.best) {
            self.best = self.current.clone();
        }
    }

    /// Randomised search followed by a deterministic removal sweep.
    ///
    /// The budget is `iteration_factor * pool size` flips; the first half may
    /// add vertices, the second half only removes. Never makes the best chain
    /// worse than the initial one.
    pub fn optimize(&mut self, rng: &mut StdRng) {
        if self.pool.is_empty() {
            return;
        }
        self.reset_to(self.best.clone());
        let budget = self.iteration_factor * self.pool.len();
        let explore = budget / 2;
        for iteration in 0..budget {
            let target = self.pool[rng.gen_range(0..self.pool.len())];
            if self.current.contains(&target) {
                if self.is_removable(target) {
                    self.remove(target);
                    self.record_best();
                }
            } else if iteration < explore && self.is_addable(target) {
                self.add(target);
            }
        }

        self.reset_to(self.best.clone());
        // Shared vertices first, then the rest, each in id order
        let mut sweep: Vec<Vertex> = self.current.iter().copied().collect();
        sweep.sort_by_key(|&t| (!self.is_bad(t), t));
        for target in sweep {
            if self.is_removable(target) {
                self.remove(target);
            }
        }
        self.record_best();
    }

    /// Whether the best chain still touches every required neighbour chain in
    /// the live state, and is connected.
    pub fn remains_valid(&self, view: &dyn EmbeddingView) -> bool {
        !self.best.is_empty()
            && is_connected_within(view.target_adjacency(), &self.best)
            && self.required.iter().all(|&n| {
                self.best
                    .iter()
                    .any(|&t| view.touches_chain(t, n))
            })
    }
}
