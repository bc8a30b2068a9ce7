// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Property-based tests for the graph primitives and the chain reducer.

mod common;

use common::{placed_state, sequential_config};
use minor_embedding::graph::cut_vertex::is_connected_within;
use minor_embedding::graph::generators::{chimera, complete, cycle, erdos_renyi};
use minor_embedding::graph::{identify_cut_vertices, AdjacencyList, Graph};
use minor_embedding::reducer::SuperVertexReducer;
use minor_embedding::EmbeddingView;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;

/// A random tree on `parents.len() + 1` vertices: vertex `i + 1` hangs off
/// `parents[i] % (i + 1)`.
fn tree(parents: &[u32]) -> Graph {
    parents
        .iter()
        .enumerate()
        .map(|(i, &p)| (p % (i as u32 + 1), i as u32 + 1))
        .collect()
}

proptest! {
    /// Cycles and cliques are 2-connected: no cut vertices.
    #[test]
    fn prop_biconnected_graphs_have_no_cut_vertex(n in 3u32..40) {
        for graph in [cycle(n), complete(n.min(12))] {
            let adjacency = AdjacencyList::from_graph(&graph);
            let cut = identify_cut_vertices(&adjacency, adjacency.len()).unwrap();
            prop_assert!(cut.is_empty(), "{:?}", cut);
        }
    }

    /// In a tree the cut vertices are exactly the non-leaves.
    #[test]
    fn prop_tree_cut_vertices_are_internal(parents in prop::collection::vec(0u32..1000, 2..40)) {
        let graph = tree(&parents);
        let adjacency = AdjacencyList::from_graph(&graph);
        let cut = identify_cut_vertices(&adjacency, adjacency.len()).unwrap();
        let internal: BTreeSet<u32> = adjacency
            .vertices()
            .filter(|&v| adjacency.degree(v) > 1)
            .collect();
        prop_assert_eq!(cut, internal);
    }

    /// The reducer never returns a worse or disconnected chain, however many
    /// times it is rerun from its best chain.
    #[test]
    fn prop_reducer_is_monotone(graph_seed in 0u64..64, rng_seed in 0u64..1000) {
        let source = erdos_renyi(10, 0.35, graph_seed);
        prop_assume!(!source.is_empty());
        let state = placed_state(&source, &chimera(2, 2), &sequential_config(graph_seed));
        for node in source.vertices() {
            let mut reducer = SuperVertexReducer::new(&state, node, 4);
            let mut previous = reducer.fitness(reducer.initial());
            let mut improved = false;
            for round in 0..3 {
                let mut rng = StdRng::seed_from_u64(rng_seed * 3 + round);
                reducer.optimize(&mut rng);
                let fitness = reducer.fitness(reducer.best());
                prop_assert!(fitness <= previous, "round {} of node {}", round, node);
                prop_assert!(improved <= reducer.improved(), "round {} of node {}", round, node);
                previous = fitness;
                improved = reducer.improved();
                prop_assert!(!reducer.best().is_empty());
                prop_assert!(is_connected_within(state.target_adjacency(), reducer.best()));
                prop_assert!(reducer.remains_valid(&state));
            }
        }
    }
}
