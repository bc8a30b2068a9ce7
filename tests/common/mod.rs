// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use minor_embedding::graph::AdjacencyList;
use minor_embedding::{
    Embedding, EmbeddingConfig, EmbeddingState, EmbeddingView, Graph, Statistics,
    SuperVertexPlacer,
};

/// Single-threaded configuration with a fixed seed.
pub fn sequential_config(seed: u64) -> EmbeddingConfig {
    EmbeddingConfig::default().with_seed(seed).with_threads(1)
}

/// A state after the constructive phase only.
pub fn placed_state(source: &Graph, target: &Graph, config: &EmbeddingConfig) -> EmbeddingState {
    let statistics = Statistics::new();
    let mut state = EmbeddingState::new(source, target).expect("valid input graphs");
    let mut placer = SuperVertexPlacer::new(&state, config, &statistics);
    placer.place_all(&mut state).expect("placement succeeds");
    state
}

/// Panic with a description of the first defect if `embedding` is not a
/// minor embedding of `source` in `target`.
pub fn assert_valid(embedding: &Embedding, source: &Graph, target: &Graph) {
    let adjacency = AdjacencyList::from_graph(target);
    for s in source.vertices() {
        let chain = embedding
            .chain(s)
            .unwrap_or_else(|| panic!("source vertex {} is unmapped", s));
        assert!(!chain.is_empty(), "chain of {} is empty", s);
        for &t in chain {
            assert!(adjacency.contains_vertex(t), "{} is not a target vertex", t);
        }
    }
    assert_eq!(embedding.overlap_count(), 0, "chains overlap: {:?}", embedding.mapping());
    assert!(
        embedding.is_valid(source, target),
        "not a minor embedding: {:?}",
        embedding.mapping()
    );
}

/// Sum of chain lengths seen by `view`.
pub fn total_length(view: &dyn EmbeddingView) -> usize {
    view.mapping().values().map(|chain| chain.len()).sum()
}
