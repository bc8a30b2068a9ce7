// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! End-to-end embedding runs.

mod common;

use common::{assert_valid, sequential_config};
use minor_embedding::graph::generators::{chimera, complete, cycle, king, petersen};
use minor_embedding::graph::parse_edge_list;
use minor_embedding::{Counters, EmbeddingConfig, EmbeddingError, EmbeddingSuite, Graph};

#[test]
fn test_cycle_in_single_cell() {
    let suite = EmbeddingSuite::new(cycle(4), chimera(1, 1), sequential_config(1));
    let embedding = suite.find_embedding().unwrap();
    assert_valid(&embedding, suite.source(), suite.target());
    assert!(embedding.total_length() <= 8);
}

#[test]
fn test_clique_in_chimera() {
    let suite = EmbeddingSuite::new(complete(5), chimera(3, 3), sequential_config(7));
    let embedding = suite.find_embedding().unwrap();
    assert_valid(&embedding, suite.source(), suite.target());
    assert!(suite.statistics().get(Counters::ComplexPlacements) >= 1);
}

#[test]
fn test_k8_in_chimera() {
    let suite = EmbeddingSuite::new(complete(8), chimera(3, 3), sequential_config(8));
    let embedding = suite.find_embedding().unwrap();
    assert_valid(&embedding, suite.source(), suite.target());
}

#[test]
fn test_petersen_in_king_graph() {
    let config = EmbeddingConfig::default().with_seed(3).with_threads(4);
    let suite = EmbeddingSuite::new(petersen(), king(6, 6), config);
    let embedding = suite.find_embedding().unwrap();
    assert_valid(&embedding, suite.source(), suite.target());
}

#[test]
fn test_construction_rounds() {
    let config = sequential_config(11).with_construction_mutation_interval(Some(2));
    let suite = EmbeddingSuite::new(cycle(8), king(4, 4), config);
    let embedding = suite.find_embedding().unwrap();
    assert_valid(&embedding, suite.source(), suite.target());
    assert!(suite.statistics().get(Counters::MutationsPrepared) > 0);
}

#[test]
fn test_parallel_construction_rounds() {
    let config = EmbeddingConfig::default()
        .with_seed(12)
        .with_threads(2)
        .with_construction_mutation_interval(Some(1));
    let suite = EmbeddingSuite::new(cycle(8), king(4, 4), config);
    let embedding = suite.find_embedding().unwrap();
    assert_valid(&embedding, suite.source(), suite.target());
    assert!(suite.statistics().get(Counters::MutationsPrepared) > 0);
}

#[test]
fn test_parsed_graphs() {
    let source = parse_edge_list(b"[[0,1],[1,2],[2,0],[2,3]]").unwrap();
    let target = parse_edge_list(b"[[0,1],[1,2],[2,3],[3,0],[0,2],[3,4]]").unwrap();
    let suite = EmbeddingSuite::new(source, target, sequential_config(5));
    let embedding = suite.find_embedding().unwrap();
    assert_valid(&embedding, suite.source(), suite.target());
}

#[test]
fn test_impossible_embedding_is_reported_invalid() {
    // K4 is not a minor of a path
    let config = sequential_config(2).with_max_passes(4);
    let suite = EmbeddingSuite::new(complete(4), king(1, 6), config);
    let embedding = suite.find_embedding().unwrap();
    assert_eq!(embedding.mapping().len(), 4);
    assert!(!embedding.is_valid(suite.source(), suite.target()));
}

#[test]
fn test_self_loop_in_source_is_rejected() {
    let suite = EmbeddingSuite::new(
        Graph::from_edges([(0, 0), (0, 1)]),
        chimera(1, 1),
        EmbeddingConfig::default(),
    );
    assert!(matches!(
        suite.find_embedding(),
        Err(EmbeddingError::SelfLoop { vertex: 0 })
    ));
}

#[test]
fn test_empty_target_is_rejected() {
    let suite = EmbeddingSuite::new(cycle(3), Graph::new(), EmbeddingConfig::default());
    assert!(matches!(
        suite.find_embedding(),
        Err(EmbeddingError::EmptyGraph { .. })
    ));
}
