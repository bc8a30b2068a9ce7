// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Local moves over the embedding.
//!
//! A [`Mutation`] goes through a fixed lifecycle:
//! 1. `prepare`: read-only exploration of a snapshot, producing a plan and an
//!    improvement estimate (negative is better)
//! 2. `is_valid`: re-check the plan against the live state, which may have
//!    moved on since `prepare`
//! 3. `execute`: stage the plan through a [`MutationSink`] and commit
//!
//! Preparation runs concurrently on a worker pool; validation and execution
//! run on the single incorporating thread (see [`manager`]).
//!
//! Operators:
//! - [`Extend`]: grow a deficient chain by one free vertex
//! - [`FrontierShifting`]: move a contested vertex from a long chain to a
//!   shorter neighbour chain
//! - [`ReduceOverlap`]: reshape one chain with the reducer

pub mod barrier;
pub mod extend;
pub mod frontier_shifting;
pub mod manager;
pub mod reduce_overlap;

pub use barrier::PrepareBarrier;
pub use extend::Extend;
pub use frontier_shifting::FrontierShifting;
pub use manager::{preparer_pool, MutationManager};
pub use reduce_overlap::ReduceOverlap;

use crate::config::EmbeddingConfig;
use crate::graph::Vertex;
use crate::state::{CandidateCache, EmbeddingView, MutationSink};
use rand::rngs::StdRng;
use std::fmt;
use strum_macros::IntoStaticStr;

/// Which operator a mutation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum MutationKind {
    Extend,
    FrontierShifting,
    ReduceOverlap,
}

/// A local move with a prepare / validate / execute lifecycle.
pub trait Mutation: Send + fmt::Debug {
    fn kind(&self) -> MutationKind;

    /// The source vertex the move is centred on.
    fn node(&self) -> Vertex;

    /// Explore `view` and plan a move. Returns whether a beneficial plan was
    /// found.
    fn prepare(
        &mut self,
        view: &dyn EmbeddingView,
        cache: &dyn CandidateCache,
        rng: &mut StdRng,
    ) -> bool;

    /// Estimated change in cost of the prepared plan; negative is better.
    fn improvement(&self) -> i64;

    /// Whether the prepared plan still applies to `view`.
    fn is_valid(&self, view: &dyn EmbeddingView) -> bool;

    /// Stage the prepared plan and commit it.
    fn execute(&self, view: &dyn EmbeddingView, sink: &dyn MutationSink);
}

/// Cost of a chain of `len` target vertices.
///
/// Quadratic, so that moving a vertex from a long chain to a short one pays.
pub fn chain_cost(len: usize) -> i64 {
    let len = len as i64;
    len * len
}

/// Change in total cost when one vertex leaves a chain of `from_len` and
/// joins a chain of `to_len`.
pub fn transfer_delta(from_len: usize, to_len: usize) -> i64 {
    chain_cost(from_len.saturating_sub(1)) + chain_cost(to_len + 1)
        - chain_cost(from_len)
        - chain_cost(to_len)
}

/// Change in total cost when one vertex leaves a chain of `from_len`.
pub fn removal_delta(from_len: usize) -> i64 {
    chain_cost(from_len.saturating_sub(1)) - chain_cost(from_len)
}

/// Phase a mutation round runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundKind {
    /// Interleaved with placement: chains may still grow.
    Construction,
    /// After placement: only reshape and rebalance.
    Refinement,
}

/// The mutations worth trying on the current state.
///
/// - Extend for every chain with a free-neighbour deficit (construction only)
/// - ReduceOverlap for every chain that is shared or longer than one vertex
/// - FrontierShifting for every mapped source vertex
pub fn round_mutations(
    view: &dyn EmbeddingView,
    config: &EmbeddingConfig,
    round: RoundKind,
) -> Vec<Box<dyn Mutation>> {
    let mut mutations: Vec<Box<dyn Mutation>> = Vec::new();
    for (&source, chain) in view.mapping() {
        if chain.is_empty() {
            continue;
        }
        if round == RoundKind::Construction && view.number_free_neighbors_needed(source) > 0 {
            mutations.push(Box::new(Extend::new(source)));
        }
        if chain.len() > 1 || chain.iter().any(|&t| view.overlap(t) > 1) {
            mutations.push(Box::new(ReduceOverlap::new(
                source,
                config.reducer_iteration_factor,
            )));
        }
        mutations.push(Box::new(FrontierShifting::new(source)));
    }
    mutations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::generators::king;
    use crate::graph::Graph;
    use crate::state::{Chain, EmbeddingState};

    #[test]
    fn test_cost_deltas() {
        assert_eq!(chain_cost(3), 9);
        // (4-1)^2 + (1+1)^2 - 16 - 1
        assert_eq!(transfer_delta(4, 1), -4);
        assert_eq!(transfer_delta(2, 2), 2);
        assert_eq!(removal_delta(3), -5);
        assert_eq!(removal_delta(0), 0);
    }

    #[test]
    fn test_round_selects_operators() {
        let source = Graph::from_edges([(0, 1), (1, 2)]);
        // A path of five target vertices leaves chain {1, 2} one free neighbour
        let mut state = EmbeddingState::new(&source, &king(1, 5)).unwrap();
        state.map_node(0, 0).unwrap();
        state.map_node_to_chain(1, &Chain::from([1, 2])).unwrap();

        let config = EmbeddingConfig::default();
        let refinement = round_mutations(&state, &config, RoundKind::Refinement);
        let kinds: Vec<MutationKind> = refinement.iter().map(|m| m.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                MutationKind::FrontierShifting,
                MutationKind::ReduceOverlap,
                MutationKind::FrontierShifting
            ]
        );

        let construction = round_mutations(&state, &config, RoundKind::Construction);
        assert!(construction
            .iter()
            .any(|m| m.kind() == MutationKind::Extend && m.node() == 1));
    }
}
