// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Reshape one chain with the [`SuperVertexReducer`].

use super::{chain_cost, Mutation, MutationKind};
use crate::graph::Vertex;
use crate::reducer::SuperVertexReducer;
use crate::state::{CandidateCache, EmbeddingView, MutationSink};
use rand::rngs::StdRng;

/// Cost of one shared target vertex, in units of chain cost.
pub const OVERLAP_WEIGHT: i64 = 1024;

#[derive(Debug, Clone)]
pub struct ReduceOverlap {
    node: Vertex,
    iteration_factor: usize,
    reducer: Option<SuperVertexReducer>,
    improvement: i64,
}

impl ReduceOverlap {
    pub fn new(node: Vertex, iteration_factor: usize) -> Self {
        Self {
            node,
            iteration_factor,
            reducer: None,
            improvement: 0,
        }
    }

    pub fn reducer(&self) -> Option<&SuperVertexReducer> {
        self.reducer.as_ref()
    }
}

impl Mutation for ReduceOverlap {
    fn kind(&self) -> MutationKind {
        MutationKind::ReduceOverlap
    }

    fn node(&self) -> Vertex {
        self.node
    }

    fn prepare(
        &mut self,
        view: &dyn EmbeddingView,
        _cache: &dyn CandidateCache,
        rng: &mut StdRng,
    ) -> bool {
        self.reducer = None;
        if !view.is_mapped(self.node) {
            return false;
        }
        let mut reducer = SuperVertexReducer::new(view, self.node, self.iteration_factor);
        reducer.optimize(rng);
        if !reducer.improved() {
            return false;
        }

        let initial = reducer.fitness(reducer.initial());
        let best = reducer.fitness(reducer.best());
        self.improvement = (best.bad as i64 - initial.bad as i64) * OVERLAP_WEIGHT
            + chain_cost(best.size)
            - chain_cost(initial.size);
        if self.improvement >= 0 {
            return false;
        }
        self.reducer = Some(reducer);
        true
    }

    fn improvement(&self) -> i64 {
        self.improvement
    }

    fn is_valid(&self, view: &dyn EmbeddingView) -> bool {
        let Some(reducer) = &self.reducer else {
            return false;
        };
        let unchanged = view.chain(self.node) == Some(reducer.initial());
        // Vertices the new chain gains must still be free of other owners
        let gains_free = reducer
            .best()
            .difference(reducer.initial())
            .all(|&t| {
                view.owners(t)
                    .map_or(true, |owners| owners.iter().all(|&o| o == self.node))
            });
        unchanged && gains_free && reducer.remains_valid(view)
    }

    fn execute(&self, view: &dyn EmbeddingView, sink: &dyn MutationSink) {
        let Some(reducer) = &self.reducer else {
            return;
        };
        sink.replace_chain(view, self.node, reducer.best());
        sink.commit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::generators::king;
    use crate::graph::Graph;
    use crate::state::{Chain, EmbeddingManager, EmbeddingState, NoCandidateCache};
    use rand::SeedableRng;

    fn overlapping_state() -> EmbeddingState {
        // 3x5 King's graph; chain of 0 runs through vertex 0 owned by source 1
        let source = Graph::from_edges([(0, 1), (0, 2)]);
        let mut state = EmbeddingState::new(&source, &king(3, 5)).unwrap();
        state.map_node(1, 0).unwrap();
        state.map_node(2, 4).unwrap();
        state
            .map_node_to_chain(0, &Chain::from([0, 1, 2, 3]))
            .unwrap();
        state
    }

    #[test]
    fn test_overlap_is_removed() {
        let state = overlapping_state();
        let mut mutation = ReduceOverlap::new(0, 8);
        assert!(mutation.prepare(&state, &NoCandidateCache, &mut StdRng::seed_from_u64(7)));
        assert!(mutation.improvement() < -OVERLAP_WEIGHT / 2);
        assert!(mutation.is_valid(&state));

        let manager = EmbeddingManager::new(state, 0);
        {
            let view = manager.view();
            mutation.execute(&view, &manager);
        }
        manager.synchronize();
        let state = manager.into_state();
        assert!(state.overlapping_targets().is_empty());
        assert!(state.chain_connected(0));
        assert!(state.chains_adjacent(0, 1));
        assert!(state.chains_adjacent(0, 2));
        assert!(state.check_invariants());
    }

    #[test]
    fn test_plan_is_invalidated_by_chain_change() {
        let mut state = overlapping_state();
        let mut mutation = ReduceOverlap::new(0, 8);
        assert!(mutation.prepare(&state, &NoCandidateCache, &mut StdRng::seed_from_u64(7)));

        state.unmap_node(0).unwrap();
        state.map_node_to_chain(0, &Chain::from([1, 2, 3])).unwrap();
        assert!(!mutation.is_valid(&state));
    }

    #[test]
    fn test_unmapped_node_has_no_plan() {
        let source = Graph::from_edges([(0, 1)]);
        let state = EmbeddingState::new(&source, &king(2, 2)).unwrap();
        let mut mutation = ReduceOverlap::new(0, 8);
        assert!(!mutation.prepare(&state, &NoCandidateCache, &mut StdRng::seed_from_u64(0)));
        assert!(!mutation.is_valid(&state));
    }
}
