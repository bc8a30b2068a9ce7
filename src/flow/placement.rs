// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Placing a source vertex that must touch several embedded chains at once.
//!
//! The target graph is mirrored once as a directed network (two opposite arcs
//! per edge). Each call then adds, or re-enables, a handful of construction
//! arcs:
//!
//! ```text
//!   s --k--> rep            rep is a vertex of the first neighbour chain
//!   x --1--> root_i         for every x in chain(neighbour_i)
//!   root_i --1--> t         one unit must land in every neighbour chain
//! ```
//!
//! Entering a free target vertex, or one of a neighbour chain, costs
//! `free_cost`. Entering a vertex of an unrelated chain costs
//! `occupied_cost`. The vertices on arcs carrying flow become the new chain,
//! after dropping the neighbour-chain vertices it does not need.

use super::network::{ArcId, FlowNetwork, FlowStatus, NodeId, INFINITE_CAPACITY};
use crate::config::EmbeddingConfig;
use crate::error::{EmbeddingError, Result};
use crate::graph::cut_vertex::is_connected_within;
use crate::graph::{AdjacencyList, Vertex};
use crate::state::{Chain, EmbeddingView};
use log::trace;
use std::collections::{HashMap, HashSet};

/// Reusable flow network over one target graph.
#[derive(Debug, Clone)]
pub struct MinCostFlowPlacer {
    network: FlowNetwork,
    node_of: HashMap<Vertex, NodeId>,
    vertex_of: Vec<Vertex>,
    base_arcs: Vec<ArcId>,
    source_terminal: NodeId,
    sink_terminal: NodeId,
    roots: Vec<NodeId>,
    construction: HashMap<(NodeId, NodeId), ArcId>,
    root_arcs: Vec<ArcId>,
    free_cost: i64,
    occupied_cost: i64,
}

impl MinCostFlowPlacer {
    /// Mirror `target` as a flow network. This is the expensive step; the
    /// placer is then reused for every complex placement of the run.
    pub fn new(target: &AdjacencyList, config: &EmbeddingConfig) -> Self {
        let mut network = FlowNetwork::new();
        let mut node_of = HashMap::with_capacity(target.len());
        let mut vertex_of = Vec::with_capacity(target.len());
        for vertex in target.vertices() {
            node_of.insert(vertex, network.add_node());
            vertex_of.push(vertex);
        }

        let mut base_arcs = Vec::new();
        for (tail, &u) in vertex_of.iter().enumerate() {
            for &v in target.neighbors(u) {
                if let Some(&head) = node_of.get(&v) {
                    base_arcs.push(network.add_arc(
                        tail,
                        head,
                        INFINITE_CAPACITY,
                        config.free_cost,
                    ));
                }
            }
        }

        let source_terminal = network.add_node();
        let sink_terminal = network.add_node();
        Self {
            network,
            node_of,
            vertex_of,
            base_arcs,
            source_terminal,
            sink_terminal,
            roots: Vec::new(),
            construction: HashMap::new(),
            root_arcs: Vec::new(),
            free_cost: config.free_cost,
            occupied_cost: config.occupied_cost,
        }
    }

    fn root(&mut self, index: usize) -> NodeId {
        while self.roots.len() <= index {
            let root = self.network.add_node();
            self.roots.push(root);
        }
        self.roots[index]
    }

    fn construction_arc(&mut self, tail: NodeId, head: NodeId, capacity: i64) -> ArcId {
        let network = &mut self.network;
        let arc = *self
            .construction
            .entry((tail, head))
            .or_insert_with(|| network.add_arc(tail, head, 0, 0));
        network.set_capacity(arc, capacity);
        arc
    }

    /// Flow that reached each neighbour root in the last successful call.
    pub fn root_flows(&self) -> Vec<i64> {
        self.root_arcs
            .iter()
            .map(|&arc| self.network.flow(arc))
            .collect()
    }

    /// Compute a chain for `node` touching every embedded neighbour chain.
    ///
    /// The view is not modified; the caller maps the returned chain.
    ///
    /// # Errors
    ///
    /// `IsolatedNode` if no source neighbour of `node` is embedded.
    /// `InfeasibleFlow` if some neighbour chain cannot be reached through the
    /// target graph, `UnboundedFlow` if the network is malformed.
    pub fn embed_node(&mut self, view: &dyn EmbeddingView, node: Vertex) -> Result<Chain> {
        let neighbors = view.embedded_source_neighbors(node);
        let Some(&first) = neighbors.first() else {
            return Err(EmbeddingError::IsolatedNode { vertex: node });
        };

        let construction: Vec<ArcId> = self.construction.values().copied().collect();
        for arc in construction {
            self.network.set_capacity(arc, 0);
        }

        let neighbor_targets: HashSet<Vertex> = neighbors
            .iter()
            .filter_map(|&n| view.chain(n))
            .flatten()
            .copied()
            .collect();
        self.assign_costs(view, node, &neighbor_targets);

        let representative = representative(view, first)
            .ok_or(EmbeddingError::IsolatedNode { vertex: node })?;
        let rep_node = *self
            .node_of
            .get(&representative)
            .ok_or(EmbeddingError::UnknownVertex {
                vertex: representative,
            })?;
        let k = neighbors.len() as i64;
        self.construction_arc(self.source_terminal, rep_node, k);

        self.root_arcs.clear();
        for (index, &neighbor) in neighbors.iter().enumerate() {
            let root = self.root(index);
            for &target in view.chain(neighbor).into_iter().flatten() {
                if let Some(&tail) = self.node_of.get(&target) {
                    self.construction_arc(tail, root, 1);
                }
            }
            let arc = self.construction_arc(root, self.sink_terminal, 1);
            self.root_arcs.push(arc);
        }
        self.network.set_supply(self.source_terminal, k);
        self.network.set_supply(self.sink_terminal, -k);

        match self.network.solve() {
            FlowStatus::Optimal => {}
            FlowStatus::Infeasible => return Err(EmbeddingError::InfeasibleFlow { vertex: node }),
            FlowStatus::Unbounded => return Err(EmbeddingError::UnboundedFlow { vertex: node }),
        }

        let mut chain: Chain = self
            .base_arcs
            .iter()
            .filter(|&&arc| self.network.flow(arc) > 0)
            .flat_map(|&arc| {
                [
                    self.vertex_of[self.network.tail(arc)],
                    self.vertex_of[self.network.head(arc)],
                ]
            })
            .collect();
        if chain.is_empty() {
            // Only one neighbour: the unit went straight from rep to its root
            chain.insert(attachment(view, first, representative));
        }
        prune(view, &mut chain, &neighbors, &neighbor_targets);
        if chain.iter().all(|t| neighbor_targets.contains(t)) {
            // Neighbour chains already touch; a shared free vertex avoids overlap
            if let Some(free) = common_free_neighbor(view, &neighbors) {
                chain = Chain::from([free]);
            }
        }

        trace!(
            "flow placement of {} over {} neighbours: cost {}, chain {:?}",
            node,
            neighbors.len(),
            self.network.total_cost(),
            chain
        );
        Ok(chain)
    }

    fn assign_costs(
        &mut self,
        view: &dyn EmbeddingView,
        node: Vertex,
        neighbor_targets: &HashSet<Vertex>,
    ) {
        for &arc in &self.base_arcs {
            let head = self.vertex_of[self.network.head(arc)];
            let cheap = !view.is_occupied(head)
                || neighbor_targets.contains(&head)
                || view
                    .owners(head)
                    .is_some_and(|owners| owners.iter().all(|&o| o == node));
            let cost = if cheap {
                self.free_cost
            } else {
                self.occupied_cost
            };
            self.network.set_cost(arc, cost);
        }
    }
}

/// The vertex of `neighbor`'s chain with the most free target neighbours.
fn representative(view: &dyn EmbeddingView, neighbor: Vertex) -> Option<Vertex> {
    let chain = view.chain(neighbor)?;
    chain.iter().copied().max_by_key(|&t| {
        let free = view
            .target_adjacency()
            .neighbors(t)
            .iter()
            .filter(|&&n| !view.is_occupied(n))
            .count();
        // Ties go to the smallest id
        (free, std::cmp::Reverse(t))
    })
}

/// A single vertex touching the chain of `neighbor`: a free neighbour if one
/// exists, else the least shared neighbour, else `fallback`.
pub(crate) fn attachment(view: &dyn EmbeddingView, neighbor: Vertex, fallback: Vertex) -> Vertex {
    if let Some(&free) = view.free_target_neighbors(neighbor).first() {
        return free;
    }
    let mut best: Option<(usize, Vertex)> = None;
    view.for_each_target_neighbor(neighbor, &mut |_, n| {
        let key = (view.overlap(n), n);
        if best.map_or(true, |b| key < b) {
            best = Some(key);
        }
    });
    best.map_or(fallback, |(_, n)| n)
}

/// A free target vertex adjacent to every neighbour chain.
fn common_free_neighbor(view: &dyn EmbeddingView, neighbors: &[Vertex]) -> Option<Vertex> {
    let first = *neighbors.first()?;
    view.free_target_neighbors(first)
        .into_iter()
        .find(|&t| neighbors.iter().all(|&n| view.touches_chain(t, n)))
}

fn touches(view: &dyn EmbeddingView, chain: &Chain, neighbor: Vertex) -> bool {
    chain.iter().any(|&t| view.touches_chain(t, neighbor))
}

/// Drop neighbour-chain vertices the new chain does not need to stay
/// connected and touch every neighbour.
fn prune(
    view: &dyn EmbeddingView,
    chain: &mut Chain,
    neighbors: &[Vertex],
    neighbor_targets: &HashSet<Vertex>,
) {
    let candidates: Vec<Vertex> = chain
        .iter()
        .copied()
        .filter(|t| neighbor_targets.contains(t))
        .collect();
    for target in candidates {
        if chain.len() <= 1 {
            break;
        }
        chain.remove(&target);
        let keeps = is_connected_within(view.target_adjacency(), chain)
            && neighbors.iter().all(|&n| touches(view, chain, n));
        if !keeps {
            chain.insert(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::generators::{cycle, king};
    use crate::graph::Graph;
    use crate::state::EmbeddingState;

    fn placer(state: &EmbeddingState) -> MinCostFlowPlacer {
        MinCostFlowPlacer::new(state.target_adjacency(), &EmbeddingConfig::default())
    }

    #[test]
    fn test_star_center_touches_every_leaf() {
        // Star 0 - {1, 2, 3} into a 5x5 King's graph, leaves in three corners
        let source = Graph::from_edges([(0, 1), (0, 2), (0, 3)]);
        let mut state = EmbeddingState::new(&source, &king(5, 5)).unwrap();
        state.map_node(1, 0).unwrap();
        state.map_node(2, 4).unwrap();
        state.map_node(3, 20).unwrap();

        let mut placer = placer(&state);
        let chain = placer.embed_node(&state, 0).unwrap();
        assert_eq!(placer.root_flows(), vec![1, 1, 1]);

        assert!(is_connected_within(state.target_adjacency(), &chain));
        for leaf in 1..=3 {
            assert!(touches(&state, &chain, leaf), "leaf {} not touched", leaf);
        }
        for corner in [0, 4, 20] {
            assert!(!chain.contains(&corner));
        }

        state.map_node_to_chain(0, &chain).unwrap();
        assert!(state.is_valid_embedding());
    }

    #[test]
    fn test_placer_is_reusable() {
        let source = Graph::from_edges([(0, 1), (0, 2), (3, 1), (3, 2)]);
        let mut state = EmbeddingState::new(&source, &king(4, 4)).unwrap();
        state.map_node(1, 0).unwrap();
        state.map_node(2, 15).unwrap();

        let mut placer = placer(&state);
        let first = placer.embed_node(&state, 0).unwrap();
        state.map_node_to_chain(0, &first).unwrap();
        let second = placer.embed_node(&state, 3).unwrap();
        assert_eq!(placer.root_flows(), vec![1, 1]);
        assert!(touches(&state, &second, 1));
        assert!(touches(&state, &second, 2));
    }

    #[test]
    fn test_single_neighbor_gets_adjacent_vertex() {
        let source = Graph::from_edges([(0, 1)]);
        let mut state = EmbeddingState::new(&source, &cycle(6)).unwrap();
        state.map_node(1, 3).unwrap();
        let chain = placer(&state).embed_node(&state, 0).unwrap();
        assert_eq!(chain.len(), 1);
        assert!(touches(&state, &chain, 1));
    }

    #[test]
    fn test_isolated_node_is_an_error() {
        let source = Graph::from_edges([(0, 1)]);
        let state = EmbeddingState::new(&source, &cycle(6)).unwrap();
        assert!(matches!(
            placer(&state).embed_node(&state, 0),
            Err(EmbeddingError::IsolatedNode { vertex: 0 })
        ));
    }

    #[test]
    fn test_disconnected_target_is_infeasible() {
        // Two triangles with no edge between them
        let target = Graph::from_edges([(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
        let source = Graph::from_edges([(0, 1), (0, 2)]);
        let mut state = EmbeddingState::new(&source, &target).unwrap();
        state.map_node(1, 0).unwrap();
        state.map_node(2, 3).unwrap();
        assert!(matches!(
            placer(&state).embed_node(&state, 0),
            Err(EmbeddingError::InfeasibleFlow { vertex: 0 })
        ));
    }
}
