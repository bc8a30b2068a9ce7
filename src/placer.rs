// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! The constructive phase.
//!
//! Source vertices are placed one at a time, most-connected first. A
//! priority queue holds unplaced vertices keyed by how many of their source
//! neighbours already have a chain; entries go stale when the count grows and
//! are skipped when popped for an already placed vertex.
//!
//! Each placement is one of three kinds:
//! - **Trivial**: nothing is queued, so start a new region on a free target
//! - **Simple**: one embedded neighbour, attach a single adjacent target
//! - **Complex**: several embedded neighbours, solve a min-cost flow

use crate::config::EmbeddingConfig;
use crate::error::Result;
use crate::flow::placement::attachment;
use crate::flow::MinCostFlowPlacer;
use crate::graph::Vertex;
use crate::state::{Chain, EmbeddingState, EmbeddingView};
use crate::statistics::{Counters, Statistics};
use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// How a source vertex was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementKind {
    Trivial,
    Simple,
    Complex,
}

impl PlacementKind {
    fn counter(self) -> Counters {
        match self {
            PlacementKind::Trivial => Counters::TrivialPlacements,
            PlacementKind::Simple => Counters::SimplePlacements,
            PlacementKind::Complex => Counters::ComplexPlacements,
        }
    }
}

/// Drives the constructive phase over an [`EmbeddingState`].
pub struct SuperVertexPlacer<'a> {
    statistics: &'a Statistics,
    flow: MinCostFlowPlacer,
    queue: BinaryHeap<(u32, Reverse<Vertex>)>,
    rng: StdRng,
}

impl<'a> SuperVertexPlacer<'a> {
    /// Prepare a placer for `state`. Builds the flow network once.
    pub fn new(state: &EmbeddingState, config: &EmbeddingConfig, statistics: &'a Statistics) -> Self {
        Self {
            statistics,
            flow: MinCostFlowPlacer::new(state.target_adjacency(), config),
            queue: BinaryHeap::new(),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Place every remaining source vertex. Returns how many were placed.
    pub fn place_all(&mut self, state: &mut EmbeddingState) -> Result<usize> {
        let mut placed = 0;
        while self.place_next(state)?.is_some() {
            placed += 1;
        }
        Ok(placed)
    }

    /// Place one source vertex, or return `None` if none remain.
    ///
    /// # Errors
    ///
    /// Propagates flow failures of complex placements.
    pub fn place_next(
        &mut self,
        state: &mut EmbeddingState,
    ) -> Result<Option<(Vertex, PlacementKind)>> {
        let Some(node) = self.next_node(state) else {
            return Ok(None);
        };
        let kind = self.place_node(state, node)?;
        Ok(Some((node, kind)))
    }

    /// Place the unmapped source vertex `node` next to its embedded
    /// neighbours, and queue its unplaced neighbours.
    ///
    /// # Errors
    ///
    /// Propagates flow failures of complex placements.
    pub fn place_node(&mut self, state: &mut EmbeddingState, node: Vertex) -> Result<PlacementKind> {
        let embedded = state.embedded_source_neighbors(node);
        let (kind, chain) = match embedded.as_slice() {
            [] => (PlacementKind::Trivial, self.trivial_chain(state)),
            [neighbor] => (PlacementKind::Simple, simple_chain(state, *neighbor)),
            _ => (PlacementKind::Complex, self.flow.embed_node(state, node)?),
        };
        state.map_node_to_chain(node, &chain)?;
        self.statistics.increment(kind.counter());
        trace!("placed {} ({:?}) on {:?}", node, kind, chain);

        for &neighbor in state.source_adjacency().neighbors(node) {
            if state.remaining_source_nodes().contains(&neighbor) {
                let embedded = state.counters(neighbor).embedded;
                self.queue.push((embedded, Reverse(neighbor)));
            }
        }
        Ok(kind)
    }

    /// Rip up the chain of `node` and place it again against the chains of
    /// its neighbours as they are now.
    ///
    /// # Errors
    ///
    /// As [`place_node`](Self::place_node).
    pub fn replace_node(&mut self, state: &mut EmbeddingState, node: Vertex) -> Result<PlacementKind> {
        state.unmap_node(node)?;
        self.place_node(state, node)
    }

    fn next_node(&mut self, state: &EmbeddingState) -> Option<Vertex> {
        while let Some((_, Reverse(node))) = self.queue.pop() {
            // Stale: placed since it was queued
            if state.remaining_source_nodes().contains(&node) {
                return Some(node);
            }
        }
        state.remaining_source_nodes().first().copied()
    }

    fn trivial_chain(&mut self, state: &EmbeddingState) -> Chain {
        let free = state.free_target_nodes();
        let target = if free.is_empty() {
            least_overlapped(state)
        } else {
            let index = self.rng.gen_range(0..free.len());
            free.iter().nth(index).copied()
        };
        target.into_iter().collect()
    }
}

/// One target vertex next to the chain of `neighbor`: the free neighbour with
/// the most free neighbours of its own, else the least shared one.
fn simple_chain(view: &dyn EmbeddingView, neighbor: Vertex) -> Chain {
    let best_free = view
        .free_target_neighbors(neighbor)
        .into_iter()
        .max_by_key(|&t| {
            let room = view
                .target_adjacency()
                .neighbors(t)
                .iter()
                .filter(|&&n| !view.is_occupied(n))
                .count();
            (room, Reverse(t))
        });
    let fallback = view
        .chain(neighbor)
        .and_then(|chain| chain.first().copied())
        .unwrap_or_default();
    let target = best_free.unwrap_or_else(|| attachment(view, neighbor, fallback));
    Chain::from([target])
}

fn least_overlapped(view: &dyn EmbeddingView) -> Option<Vertex> {
    view.target_adjacency()
        .vertices()
        .min_by_key(|&t| (view.overlap(t), t))
}
