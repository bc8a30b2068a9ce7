// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Crater repair.
//!
//! A crater is a ball of target vertices. Every chain that enters it loses
//! its crater vertices; the heuristic then rebuilds the damaged chains:
//!
//! 1. *border*: the target vertices just outside the crater
//! 2. *edges*: the source edges incident to a damaged chain whose other end
//!    is embedded; these must be realised again
//! 3. *components*: a damaged chain that keeps vertices outside the crater
//!    may have fallen apart; its pieces are rejoined, largest chain first
//! 4. each surviving chain is linked to every neighbour chain it no longer
//!    touches
//! 5. chains that lay entirely inside the crater (*destroyed*) are placed
//!    again from scratch
//!
//! Paths are shortest under the cost `(new overlaps, new vertices)`, compared
//! lexicographically, and are searched inside the crater first and through
//! the whole target graph only if that fails. Chains only grow during the
//! repair, so a link once made is never broken by a later one.
//!
//! The heuristic works on a private copy of the damaged chains. Nothing
//! reaches the shared state until [`LmrpHeuristic::stage`].

pub mod crater;

pub use crater::{border_of, crater_around, ClaimId, CraterClaim, CraterRegistry};

use crate::graph::cut_vertex::{connected_component_within, is_connected_within};
use crate::graph::{AdjacencyList, Vertex};
use crate::state::{Chain, EmbeddingView, Mapping, MutationSink};
use log::trace;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, VecDeque};

/// Lexicographic path cost: overlaps created, then vertices added.
type PathCost = (u32, u32);

/// Re-embeds every chain damaged by one crater.
pub struct LmrpHeuristic<'a> {
    view: &'a dyn EmbeddingView,
    crater: BTreeSet<Vertex>,
    border: BTreeSet<Vertex>,
    affected: BTreeSet<Vertex>,
    destroyed: BTreeSet<Vertex>,
    edges: BTreeSet<(Vertex, Vertex)>,
    // Working chains of the affected sources
    chains: Mapping,
    solved: bool,
}

impl<'a> LmrpHeuristic<'a> {
    /// Tear `crater` out of the embedding seen by `view`.
    pub fn new(view: &'a dyn EmbeddingView, crater: BTreeSet<Vertex>) -> Self {
        let border = border_of(view.target_adjacency(), &crater);

        let affected: BTreeSet<Vertex> = crater
            .iter()
            .filter_map(|&t| view.owners(t))
            .flatten()
            .copied()
            .collect();

        let mut chains = Mapping::new();
        let mut destroyed = BTreeSet::new();
        for &s in &affected {
            let remnant: Chain = view
                .chain(s)
                .map(|chain| chain.difference(&crater).copied().collect())
                .unwrap_or_default();
            if remnant.is_empty() {
                destroyed.insert(s);
            }
            chains.insert(s, remnant);
        }

        let mut edges = BTreeSet::new();
        for &s in &affected {
            for &n in view.source_adjacency().neighbors(s) {
                if n != s && view.is_mapped(n) {
                    edges.insert((s.min(n), s.max(n)));
                }
            }
        }

        Self {
            view,
            crater,
            border,
            affected,
            destroyed,
            edges,
            chains,
            solved: false,
        }
    }

    pub fn crater(&self) -> &BTreeSet<Vertex> {
        &self.crater
    }

    pub fn border(&self) -> &BTreeSet<Vertex> {
        &self.border
    }

    /// Source vertices whose chain entered the crater.
    pub fn affected(&self) -> &BTreeSet<Vertex> {
        &self.affected
    }

    /// Source vertices whose chain lay entirely inside the crater.
    pub fn destroyed(&self) -> &BTreeSet<Vertex> {
        &self.destroyed
    }

    /// Source edges the repair must realise.
    pub fn required_edges(&self) -> &BTreeSet<(Vertex, Vertex)> {
        &self.edges
    }

    /// Working chains of the affected sources.
    pub fn repaired_chains(&self) -> &Mapping {
        &self.chains
    }

    /// Connected pieces of the working chain of `source`, largest first.
    pub fn components(&self, source: Vertex) -> Vec<Chain> {
        let Some(chain) = self.chains.get(&source) else {
            return Vec::new();
        };
        let mut remaining = chain.clone();
        let mut pieces = Vec::new();
        while let Some(start) = remaining.first().copied() {
            let piece = connected_component_within(self.target(), chain, start);
            for t in &piece {
                remaining.remove(t);
            }
            pieces.push(piece);
        }
        pieces.sort_by_key(|piece| (Reverse(piece.len()), piece.iter().next().copied()));
        pieces
    }

    fn target(&self) -> &AdjacencyList {
        self.view.target_adjacency()
    }

    fn chain_of(&self, source: Vertex) -> Option<&Chain> {
        if self.affected.contains(&source) {
            self.chains.get(&source)
        } else {
            self.view.chain(source)
        }
    }

    fn is_mapped(&self, source: Vertex) -> bool {
        self.chain_of(source).is_some_and(|chain| !chain.is_empty())
    }

    /// Chains other than `except` containing `target`, as repaired so far.
    fn owner_count(&self, target: Vertex, except: Vertex) -> u32 {
        let unaffected = self.view.owners(target).map_or(0, |owners| {
            owners
                .iter()
                .filter(|&&o| o != except && !self.affected.contains(&o))
                .count()
        });
        let repaired = self
            .chains
            .iter()
            .filter(|(&s, chain)| s != except && chain.contains(&target))
            .count();
        (unaffected + repaired) as u32
    }

    fn adjacent(&self, a: Vertex, b: Vertex) -> bool {
        let (Some(chain_a), Some(chain_b)) = (self.chain_of(a), self.chain_of(b)) else {
            return false;
        };
        chain_a.iter().any(|&t| {
            self.target()
                .neighbors(t)
                .iter()
                .any(|n| chain_b.contains(n))
        })
    }

    /// Cheapest path leaving `from` and ending at a vertex satisfying `goal`.
    /// Returns the vertices strictly between the two.
    fn shortest_path(
        &self,
        owner: Vertex,
        from: &Chain,
        goal: &dyn Fn(Vertex) -> bool,
        restricted: bool,
    ) -> Option<Vec<Vertex>> {
        let mut best: HashMap<Vertex, PathCost> = HashMap::new();
        let mut previous: HashMap<Vertex, Vertex> = HashMap::new();
        let mut heap = BinaryHeap::new();
        for &t in from {
            best.insert(t, (0, 0));
            heap.push(Reverse(((0, 0), t)));
        }

        while let Some(Reverse((cost, u))) = heap.pop() {
            if best.get(&u).is_some_and(|&b| b < cost) {
                continue;
            }
            if !from.contains(&u) && goal(u) {
                let mut path = Vec::new();
                let mut cursor = previous.get(&u).copied();
                while let Some(v) = cursor {
                    if from.contains(&v) {
                        break;
                    }
                    path.push(v);
                    cursor = previous.get(&v).copied();
                }
                path.reverse();
                return Some(path);
            }
            for &n in self.target().neighbors(u) {
                if from.contains(&n) {
                    continue;
                }
                let step = if goal(n) {
                    (0, 0)
                } else if !restricted || self.crater.contains(&n) {
                    (self.owner_count(n, owner), 1)
                } else {
                    continue;
                };
                let next = (cost.0 + step.0, cost.1 + step.1);
                if best.get(&n).map_or(true, |&b| next < b) {
                    best.insert(n, next);
                    previous.insert(n, u);
                    heap.push(Reverse((next, n)));
                }
            }
        }
        None
    }

    /// Grow the chain of `owner` from `from` to a vertex satisfying `goal`,
    /// inside the crater if possible.
    fn connect(&mut self, owner: Vertex, from: &Chain, goal: &dyn Fn(Vertex) -> bool) -> bool {
        let path = self
            .shortest_path(owner, from, goal, true)
            .or_else(|| self.shortest_path(owner, from, goal, false));
        match path {
            Some(path) => {
                trace!("lmrp: source {} grows by {:?}", owner, path);
                self.chains.entry(owner).or_default().extend(path);
                true
            }
            None => false,
        }
    }

    /// Make the chains of `source` and `neighbor` adjacent.
    fn link(&mut self, source: Vertex, neighbor: Vertex) -> bool {
        if self.adjacent(source, neighbor) {
            return true;
        }
        let from = self.chains.get(&source).cloned().unwrap_or_default();
        let other = self.chain_of(neighbor).cloned().unwrap_or_default();
        if self.connect(source, &from, &|v| other.contains(&v) && !from.contains(&v)) {
            return true;
        }
        // Annexing only helps when every vertex of the neighbour is shared
        // with this chain; otherwise the neighbour is unreachable
        if other.is_empty() || !other.is_subset(&from) {
            return false;
        }
        let annex = other.iter().find_map(|&t| {
            self.target()
                .neighbors(t)
                .iter()
                .copied()
                .find(|n| !from.contains(n))
        });
        match annex {
            Some(n) => {
                self.chains.entry(source).or_default().insert(n);
                true
            }
            None => false,
        }
    }

    fn reconnect_components(&mut self, source: Vertex) {
        loop {
            let pieces = self.components(source);
            let Some((main, rest)) = pieces.split_first() else {
                return;
            };
            if rest.is_empty() {
                return;
            }
            let others: BTreeSet<Vertex> = rest.iter().flatten().copied().collect();
            if !self.connect(source, main, &|v| others.contains(&v)) {
                return;
            }
        }
    }

    fn embedded_neighbors(&self, source: Vertex) -> Vec<Vertex> {
        let neighbors: BTreeSet<Vertex> = self
            .view
            .source_adjacency()
            .neighbors(source)
            .iter()
            .copied()
            .filter(|&n| n != source && self.is_mapped(n))
            .collect();
        neighbors.into_iter().collect()
    }

    /// Root vertex for a destroyed chain.
    fn root_for(&self, source: Vertex, neighbors: &[Vertex]) -> Option<Vertex> {
        let touches = |t: Vertex, n: Vertex| {
            self.chain_of(n).is_some_and(|chain| {
                self.target()
                    .neighbors(t)
                    .iter()
                    .any(|m| chain.contains(m))
            })
        };

        // A free crater vertex, touching as many neighbour chains as possible
        let free = self
            .crater
            .iter()
            .copied()
            .filter(|&t| self.owner_count(t, source) == 0)
            .max_by_key(|&t| {
                let touched = neighbors.iter().filter(|&&n| touches(t, n)).count();
                (touched, Reverse(t))
            });
        if free.is_some() {
            return free;
        }

        // A crater vertex next to the largest neighbour chain
        let anchor = neighbors
            .iter()
            .copied()
            .max_by_key(|&n| (self.chain_of(n).map_or(0, BTreeSet::len), Reverse(n)));
        if let Some(anchor) = anchor {
            let next_to_anchor = self
                .crater
                .iter()
                .copied()
                .filter(|&t| touches(t, anchor))
                .min_by_key(|&t| (self.owner_count(t, source), t));
            if next_to_anchor.is_some() {
                return next_to_anchor;
            }
        }

        // The nearest free vertex anywhere
        let mut seen = self.crater.clone();
        let mut queue: VecDeque<Vertex> = self.crater.iter().copied().collect();
        while let Some(u) = queue.pop_front() {
            for &n in self.target().neighbors(u) {
                if seen.insert(n) {
                    if self.owner_count(n, source) == 0 {
                        return Some(n);
                    }
                    queue.push_back(n);
                }
            }
        }

        self.crater
            .iter()
            .copied()
            .min_by_key(|&t| (self.owner_count(t, source), t))
    }

    /// Rebuild every damaged chain. Returns whether all four repair
    /// predicates hold afterwards.
    pub fn optimize(&mut self) -> bool {
        if !self.solved {
            self.solved = true;

            let mut survivors: Vec<Vertex> = self
                .affected
                .difference(&self.destroyed)
                .copied()
                .collect();
            survivors.sort_by_key(|&s| {
                (Reverse(self.chains.get(&s).map_or(0, BTreeSet::len)), s)
            });

            for &s in &survivors {
                self.reconnect_components(s);
            }
            for &s in &survivors {
                for n in self.embedded_neighbors(s) {
                    if !self.destroyed.contains(&n) {
                        self.link(s, n);
                    }
                }
            }

            let destroyed: Vec<Vertex> = self.destroyed.iter().copied().collect();
            for d in destroyed {
                let neighbors = self.embedded_neighbors(d);
                let Some(root) = self.root_for(d, &neighbors) else {
                    continue;
                };
                self.chains.insert(d, Chain::from([root]));
                for n in neighbors {
                    self.link(d, n);
                }
            }
        }
        self.components_connected()
            && self.destroyed_connected()
            && self.all_edges_embedded()
            && self.all_destroyed_embedded()
    }

    /// Every surviving damaged chain is connected.
    pub fn components_connected(&self) -> bool {
        self.affected
            .difference(&self.destroyed)
            .all(|s| is_connected_within(self.target(), &self.chains[s]))
    }

    /// Every destroyed chain was rebuilt connected.
    pub fn destroyed_connected(&self) -> bool {
        self.destroyed.iter().all(|s| {
            self.chains.get(s).is_some_and(|chain| {
                !chain.is_empty() && is_connected_within(self.target(), chain)
            })
        })
    }

    /// Every required source edge is realised by a target edge.
    pub fn all_edges_embedded(&self) -> bool {
        self.edges.iter().all(|&(a, b)| self.adjacent(a, b))
    }

    /// Every destroyed source has a chain again.
    pub fn all_destroyed_embedded(&self) -> bool {
        self.destroyed.iter().all(|&s| self.is_mapped(s))
    }

    /// Shared vertices and total length over the damaged chains, before the
    /// repair.
    pub fn cost_before(&self) -> (u32, u32) {
        let mut overlap = 0;
        let mut length = 0;
        for &s in &self.affected {
            for &t in self.view.chain(s).into_iter().flatten() {
                overlap += self.view.overlap(t).saturating_sub(1) as u32;
                length += 1;
            }
        }
        (overlap, length)
    }

    /// Shared vertices and total length over the damaged chains, as repaired.
    pub fn cost_after(&self) -> (u32, u32) {
        let mut overlap = 0;
        let mut length = 0;
        for (&s, chain) in &self.chains {
            for &t in chain {
                overlap += self.owner_count(t, s);
                length += 1;
            }
        }
        (overlap, length)
    }

    /// Whether the repair leaves the damaged chains strictly cheaper.
    pub fn improves(&self) -> bool {
        self.cost_after() < self.cost_before()
    }

    /// Stage the repaired chains and commit them as one batch.
    pub fn stage(&self, sink: &dyn MutationSink) {
        for (&s, chain) in &self.chains {
            sink.replace_chain(self.view, s, chain);
        }
        sink.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::generators::king;
    use crate::graph::Graph;
    use crate::state::{EmbeddingManager, EmbeddingState};

    // Source path 0 - 1 - 2 on the target path 0 - 1 - ... - 7
    fn path_state() -> EmbeddingState {
        let source = Graph::from_edges([(0, 1), (1, 2)]);
        let mut state = EmbeddingState::new(&source, &king(1, 8)).unwrap();
        state.map_node_to_chain(0, &Chain::from([0, 1])).unwrap();
        state.map_node_to_chain(1, &Chain::from([2, 3, 4])).unwrap();
        state.map_node_to_chain(2, &Chain::from([5, 6])).unwrap();
        state
    }

    #[test]
    fn test_split_chain_is_rejoined() {
        let state = path_state();
        let mut lmrp = LmrpHeuristic::new(&state, BTreeSet::from([3]));
        assert_eq!(lmrp.border(), &BTreeSet::from([2, 4]));
        assert_eq!(lmrp.affected(), &BTreeSet::from([1]));
        assert!(lmrp.destroyed().is_empty());
        assert_eq!(lmrp.components(1).len(), 2);
        assert_eq!(lmrp.required_edges(), &BTreeSet::from([(0, 1), (1, 2)]));

        assert!(lmrp.optimize());
        assert_eq!(lmrp.repaired_chains()[&1], Chain::from([2, 3, 4]));
        assert!(!lmrp.improves());
    }

    #[test]
    fn test_destroyed_chain_is_rebuilt() {
        let state = path_state();
        let mut lmrp = LmrpHeuristic::new(&state, crater_around(state.target_adjacency(), 3, 1));
        assert_eq!(lmrp.destroyed(), &BTreeSet::from([1]));
        assert!(!lmrp.all_destroyed_embedded());

        assert!(lmrp.optimize());
        assert_eq!(lmrp.repaired_chains()[&1], Chain::from([2, 3, 4]));
        assert!(lmrp.destroyed_connected());
    }

    #[test]
    fn test_overlap_is_repaired() {
        let source = Graph::from_edges([(0, 1), (1, 2)]);
        let mut state = EmbeddingState::new(&source, &king(1, 6)).unwrap();
        state.map_node_to_chain(0, &Chain::from([0, 1, 2])).unwrap();
        state.map_node_to_chain(1, &Chain::from([2, 3])).unwrap();
        state.map_node(2, 4).unwrap();
        assert_eq!(state.overlapping_targets(), BTreeSet::from([2]));

        let manager = EmbeddingManager::new(state, 0);
        {
            let view = manager.view();
            let mut lmrp = LmrpHeuristic::new(&view, BTreeSet::from([2]));
            assert!(lmrp.optimize());
            assert_eq!(lmrp.cost_before(), (2, 5));
            assert_eq!(lmrp.cost_after(), (0, 4));
            assert!(lmrp.improves());
            lmrp.stage(&manager);
        }
        manager.synchronize();
        let state = manager.into_state();
        assert!(state.is_valid_embedding());
        assert!(state.check_invariants());
    }

    #[test]
    fn test_unreachable_neighbor_is_not_linked() {
        // The chain of 1 sits in a separate target component
        let source = Graph::from_edges([(0, 1)]);
        let target = Graph::from_edges([(0, 1), (1, 2), (2, 3), (10, 11)]);
        let mut state = EmbeddingState::new(&source, &target).unwrap();
        state.map_node_to_chain(0, &Chain::from([0, 1])).unwrap();
        state.map_node(1, 10).unwrap();

        let mut lmrp = LmrpHeuristic::new(&state, BTreeSet::from([1]));
        assert!(!lmrp.link(0, 1));
        assert_eq!(lmrp.repaired_chains()[&0], Chain::from([0]));
        assert!(!lmrp.optimize());
        assert!(!lmrp.all_edges_embedded());
        assert!(!lmrp.repaired_chains()[&0].contains(&11));
    }

    #[test]
    fn test_crater_outside_embedding_changes_nothing() {
        let state = path_state();
        let mut lmrp = LmrpHeuristic::new(&state, BTreeSet::from([7]));
        assert!(lmrp.affected().is_empty());
        assert!(lmrp.optimize());
        assert!(!lmrp.improves());
    }
}
