// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Constructive phase and the flow solver behind complex placements.

mod common;

use common::{placed_state, sequential_config};
use minor_embedding::flow::network::INFINITE_CAPACITY;
use minor_embedding::flow::{FlowNetwork, FlowStatus, MinCostFlowPlacer};
use minor_embedding::graph::generators::{chimera, complete, erdos_renyi, king};
use minor_embedding::graph::AdjacencyList;
use minor_embedding::{
    Chain, Counters, EmbeddingError, EmbeddingState, EmbeddingView, Graph, PlacementKind,
    Statistics, SuperVertexPlacer,
};

#[test]
fn test_every_vertex_gets_a_connected_chain() {
    for seed in 0..4 {
        let source = erdos_renyi(12, 0.3, seed);
        if source.is_empty() {
            continue;
        }
        let state = placed_state(&source, &chimera(4, 4), &sequential_config(seed));
        assert!(state.remaining_source_nodes().is_empty());
        for s in source.vertices() {
            assert!(state.is_mapped(s), "seed {}: {} unmapped", seed, s);
        }
        assert!(state.chains_connected());
        assert!(state.check_invariants());
    }
}

#[test]
fn test_placement_kinds_are_counted() {
    let source = complete(4);
    let statistics = Statistics::new();
    let config = sequential_config(0);
    let mut state = EmbeddingState::new(&source, &chimera(2, 2)).unwrap();
    let mut placer = SuperVertexPlacer::new(&state, &config, &statistics);

    let (_, first) = placer.place_next(&mut state).unwrap().unwrap();
    assert_eq!(first, PlacementKind::Trivial);
    let (_, second) = placer.place_next(&mut state).unwrap().unwrap();
    assert_eq!(second, PlacementKind::Simple);
    assert_eq!(placer.place_all(&mut state).unwrap(), 2);
    assert!(placer.place_next(&mut state).unwrap().is_none());

    assert_eq!(statistics.get(Counters::TrivialPlacements), 1);
    assert_eq!(statistics.get(Counters::SimplePlacements), 1);
    assert_eq!(statistics.get(Counters::ComplexPlacements), 2);
}

#[test]
fn test_flow_placement_reaches_distant_chains() {
    let source = Graph::from_edges([(0, 2), (1, 2)]);
    let target = king(1, 7);
    let mut state = EmbeddingState::new(&source, &target).unwrap();
    state.map_node(0, 0).unwrap();
    state.map_node(1, 6).unwrap();

    let config = sequential_config(0);
    let mut flow = MinCostFlowPlacer::new(state.target_adjacency(), &config);
    let chain = flow.embed_node(&state, 2).unwrap();
    assert_eq!(chain, Chain::from([1, 2, 3, 4, 5]));
    // One unit landed in each neighbour chain
    assert_eq!(flow.root_flows(), vec![1, 1]);
    state.map_node_to_chain(2, &chain).unwrap();
    assert!(state.is_valid_embedding());
}

#[test]
fn test_flow_placement_needs_an_embedded_neighbor() {
    let source = Graph::from_edges([(0, 1)]);
    let target = king(2, 2);
    let state = EmbeddingState::new(&source, &target).unwrap();
    let mut flow = MinCostFlowPlacer::new(&AdjacencyList::from_graph(&target), &sequential_config(0));
    assert!(matches!(
        flow.embed_node(&state, 0),
        Err(EmbeddingError::IsolatedNode { vertex: 0 })
    ));
}

#[test]
fn test_unreachable_chain_is_infeasible() {
    // Two target components: vertex 2 cannot reach the chain of 1
    let source = Graph::from_edges([(0, 2), (1, 2)]);
    let target = Graph::from_edges([(0, 1), (1, 2), (10, 11)]);
    let mut state = EmbeddingState::new(&source, &target).unwrap();
    state.map_node(0, 0).unwrap();
    state.map_node(1, 11).unwrap();
    let mut flow = MinCostFlowPlacer::new(state.target_adjacency(), &sequential_config(0));
    assert!(matches!(
        flow.embed_node(&state, 2),
        Err(EmbeddingError::InfeasibleFlow { vertex: 2 })
    ));
}

#[test]
fn test_flow_network_statuses() {
    // Two routes from 0 to 3; the cheap one has capacity 1
    let mut network = FlowNetwork::new();
    let nodes: Vec<_> = (0..4).map(|_| network.add_node()).collect();
    let cheap = network.add_arc(nodes[0], nodes[1], 1, 1);
    network.add_arc(nodes[1], nodes[3], INFINITE_CAPACITY, 1);
    let dear = network.add_arc(nodes[0], nodes[2], INFINITE_CAPACITY, 5);
    network.add_arc(nodes[2], nodes[3], INFINITE_CAPACITY, 5);
    network.set_supply(nodes[0], 2);
    network.set_supply(nodes[3], -2);

    assert_eq!(network.solve(), FlowStatus::Optimal);
    assert_eq!(network.flow(cheap), 1);
    assert_eq!(network.flow(dear), 1);
    assert_eq!(network.total_cost(), 12);

    network.set_supply(nodes[3], -3);
    assert_eq!(network.solve(), FlowStatus::Infeasible);

    let mut cyclic = FlowNetwork::new();
    let a = cyclic.add_node();
    let b = cyclic.add_node();
    cyclic.add_arc(a, b, INFINITE_CAPACITY, -1);
    cyclic.add_arc(b, a, INFINITE_CAPACITY, -1);
    cyclic.set_supply(a, 1);
    cyclic.set_supply(b, -1);
    assert_eq!(cyclic.solve(), FlowStatus::Unbounded);
}
