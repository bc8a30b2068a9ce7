// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Grow a deficient chain by one free target vertex.

use super::{Mutation, MutationKind};
use crate::graph::Vertex;
use crate::state::{CandidateCache, EmbeddingView, MutationSink};
use rand::rngs::StdRng;
use std::collections::BTreeSet;

/// Add one free neighbour of the chain of `node` to it.
///
/// Taking a free vertex removes it from every other chain it borders. The
/// move pays if the free vertices it brings to `node` outnumber the chains it
/// pushes into deficit.
#[derive(Debug, Clone)]
pub struct Extend {
    node: Vertex,
    target: Option<Vertex>,
    improvement: i64,
    free_after: i64,
}

impl Extend {
    pub fn new(node: Vertex) -> Self {
        Self {
            node,
            target: None,
            improvement: 0,
            free_after: 0,
        }
    }

    /// The planned vertex, after a successful `prepare`.
    pub fn target(&self) -> Option<Vertex> {
        self.target
    }
}

/// Other chains bordering `candidate` that are not already in deficit; losing
/// a free neighbour pushes them in.
fn degraded(view: &dyn EmbeddingView, node: Vertex, candidate: Vertex) -> i64 {
    let mut bordering = BTreeSet::new();
    for &n in view.target_adjacency().neighbors(candidate) {
        for &owner in view.owners(n).into_iter().flatten() {
            if owner != node {
                bordering.insert(owner);
            }
        }
    }
    bordering
        .into_iter()
        .filter(|&owner| view.number_free_neighbors_needed(owner) >= 0)
        .count() as i64
}

impl Mutation for Extend {
    fn kind(&self) -> MutationKind {
        MutationKind::Extend
    }

    fn node(&self) -> Vertex {
        self.node
    }

    fn prepare(
        &mut self,
        view: &dyn EmbeddingView,
        _cache: &dyn CandidateCache,
        _rng: &mut StdRng,
    ) -> bool {
        self.target = None;
        if view.number_free_neighbors_needed(self.node) <= 0 {
            return false;
        }
        let free = view.free_target_neighbors(self.node);
        let Some(chain) = view.chain(self.node) else {
            return false;
        };

        let mut best: Option<(i64, Vertex, i64)> = None;
        for &candidate in &free {
            // Free vertices the chain would newly border
            let gain = view
                .target_adjacency()
                .neighbors(candidate)
                .iter()
                .filter(|&&n| !view.is_occupied(n) && !chain.contains(&n) && !free.contains(&n))
                .count() as i64;
            let improvement = degraded(view, self.node, candidate) - gain;
            if best.map_or(true, |(b, _, _)| improvement < b) {
                let free_after = free.len() as i64 - 1 + gain;
                best = Some((improvement, candidate, free_after));
            }
        }

        match best {
            Some((improvement, candidate, free_after)) if improvement < 0 => {
                self.target = Some(candidate);
                self.improvement = improvement;
                self.free_after = free_after;
                true
            }
            _ => false,
        }
    }

    fn improvement(&self) -> i64 {
        self.improvement
    }

    fn is_valid(&self, view: &dyn EmbeddingView) -> bool {
        let Some(target) = self.target else {
            return false;
        };
        !view.is_occupied(target)
            && view.touches_chain(target, self.node)
            && view.number_free_neighbors_needed(self.node) > 0
    }

    fn execute(&self, _view: &dyn EmbeddingView, sink: &dyn MutationSink) {
        let Some(target) = self.target else {
            return;
        };
        sink.insert_mapping_pair(self.node, target);
        sink.occupy_node(target);
        sink.set_free_neighbors(self.node, self.free_after);
        sink.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::generators::king;
    use crate::graph::Graph;
    use crate::state::{EmbeddingManager, EmbeddingState, NoCandidateCache};
    use rand::SeedableRng;

    #[test]
    fn test_extend_grows_deficient_chain() {
        // Source 0 needs three neighbours but sits in a corner
        let source = Graph::from_edges([(0, 1), (0, 2), (0, 3)]);
        let mut state = EmbeddingState::new(&source, &king(4, 4)).unwrap();
        state.map_node(0, 0).unwrap();
        assert!(state.number_free_neighbors_needed(0) > 0);

        let mut extend = Extend::new(0);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(extend.prepare(&state, &NoCandidateCache, &mut rng));
        assert!(extend.improvement() < 0);
        let target = extend.target().unwrap();
        assert!(state.touches_chain(target, 0));
        assert!(extend.is_valid(&state));

        let manager = EmbeddingManager::new(state, 0);
        {
            let view = manager.view();
            extend.execute(&view, &manager);
        }
        assert_eq!(manager.pending_commits(), 1);
        manager.synchronize();
        let view = manager.view();
        assert_eq!(view.chain_len(0), 2);
        assert!(view.chain_connected(0));
        assert!(!extend.is_valid(&view));
    }

    #[test]
    fn test_no_plan_without_deficit() {
        let source = Graph::from_edges([(0, 1)]);
        let mut state = EmbeddingState::new(&source, &king(3, 3)).unwrap();
        state.map_node(0, 4).unwrap();
        let mut extend = Extend::new(0);
        assert!(!extend.prepare(&state, &NoCandidateCache, &mut StdRng::seed_from_u64(0)));
        assert!(!extend.is_valid(&state));
    }
}
