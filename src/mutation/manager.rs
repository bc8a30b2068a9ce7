// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Concurrent mutation rounds.
//!
//! A round takes a batch of unprepared mutations and resolves every one of
//! them:
//! - preparer tasks on a rayon pool pop work, prepare it against a view of
//!   the shared state, and push promising plans onto a priority queue
//!   (best improvement first, then submission order)
//! - the calling thread incorporates: it pops the best plan, re-validates
//!   it, executes and synchronizes, or requeues it for a fresh prepare
//!
//! Synchronization closes the [`PrepareBarrier`] first, so the write lock is
//! never requested while a preparer holds a view.
//!
//! With a single thread the round runs without a pool: every mutation is
//! prepared against the initial state, then the plans are incorporated.

use super::{Mutation, PrepareBarrier};
use crate::config::EmbeddingConfig;
use crate::state::EmbeddingManager;
use crate::statistics::{Counters, Statistics};
use log::{debug, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Seed of the random stream used by the `sequence`-th prepare.
pub fn mutation_seed(seed: u64, sequence: u64) -> u64 {
    seed ^ 0x9e37_79b9_7f4a_7c15u64.wrapping_mul(sequence + 1)
}

/// A mutation waiting to be prepared.
#[derive(Debug)]
struct Pending {
    sequence: u64,
    requeues: u32,
    mutation: Box<dyn Mutation>,
}

/// A promising plan waiting for the incorporator.
#[derive(Debug)]
struct Prepared {
    improvement: i64,
    sequence: u64,
    requeues: u32,
    mutation: Box<dyn Mutation>,
}

impl PartialEq for Prepared {
    fn eq(&self, other: &Self) -> bool {
        self.improvement == other.improvement && self.sequence == other.sequence
    }
}

impl Eq for Prepared {}

impl PartialOrd for Prepared {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Prepared {
    // Max-heap order: most negative improvement, then oldest
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .improvement
            .cmp(&self.improvement)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

#[derive(Debug, Default)]
struct Round {
    ready: Mutex<BinaryHeap<Prepared>>,
    // Mutations neither executed nor discarded yet
    outstanding: AtomicUsize,
}

/// Runs mutation rounds against an [`EmbeddingManager`].
pub struct MutationManager<'a> {
    embedding: &'a EmbeddingManager,
    config: &'a EmbeddingConfig,
    statistics: &'a Statistics,
    pool: Option<Arc<rayon::ThreadPool>>,
    barrier: PrepareBarrier,
    sequence: AtomicU64,
}

/// The preparer pool for `config`, or `None` when a single thread is
/// resolved or the pool cannot be started.
pub fn preparer_pool(config: &EmbeddingConfig) -> Option<Arc<rayon::ThreadPool>> {
    let threads = config.resolved_threads();
    if threads <= 1 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("mutation-prepare-{}", i))
        .build()
    {
        Ok(pool) => Some(Arc::new(pool)),
        Err(e) => {
            warn!("could not start {} preparer threads, running inline: {}", threads, e);
            None
        }
    }
}

impl<'a> MutationManager<'a> {
    /// A manager with a pool of its own.
    pub fn new(
        embedding: &'a EmbeddingManager,
        config: &'a EmbeddingConfig,
        statistics: &'a Statistics,
    ) -> Self {
        Self::with_pool(embedding, config, statistics, preparer_pool(config))
    }

    /// A manager preparing on `pool`, which may outlive it and serve later
    /// rounds.
    pub fn with_pool(
        embedding: &'a EmbeddingManager,
        config: &'a EmbeddingConfig,
        statistics: &'a Statistics,
        pool: Option<Arc<rayon::ThreadPool>>,
    ) -> Self {
        Self {
            embedding,
            config,
            statistics,
            pool,
            barrier: PrepareBarrier::new(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn embedding(&self) -> &EmbeddingManager {
        self.embedding
    }

    /// Whether preparation runs on a worker pool.
    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    fn pending(&self, mutation: Box<dyn Mutation>, requeues: u32) -> Pending {
        Pending {
            sequence: self.sequence.fetch_add(1, AtomicOrdering::Relaxed),
            requeues,
            mutation,
        }
    }

    /// Resolve every mutation in `mutations`. Returns the number executed.
    pub fn run(&self, mutations: Vec<Box<dyn Mutation>>) -> usize {
        if mutations.is_empty() {
            return 0;
        }
        let round = Round::default();
        round
            .outstanding
            .store(mutations.len(), AtomicOrdering::SeqCst);
        let submitted = mutations.len();

        let executed = match &self.pool {
            Some(pool) => {
                let round = &round;
                pool.in_place_scope(|scope| {
                    for mutation in mutations {
                        let pending = self.pending(mutation, 0);
                        scope.spawn(move |_| self.prepare_one(pending, round));
                    }
                    self.incorporate(round, |pending| {
                        scope.spawn(move |_| self.prepare_one(pending, round));
                    })
                })
            }
            None => {
                for mutation in mutations {
                    let pending = self.pending(mutation, 0);
                    self.prepare_one(pending, &round);
                }
                self.incorporate(&round, |pending| self.prepare_one(pending, &round))
            }
        };
        debug!(
            "mutation round: {} submitted, {} executed",
            submitted, executed
        );
        executed
    }

    fn prepare_one(&self, pending: Pending, round: &Round) {
        let Pending {
            sequence,
            requeues,
            mut mutation,
        } = pending;
        let mut rng = StdRng::seed_from_u64(mutation_seed(self.config.seed, sequence));
        let promising = {
            let _inside = self.barrier.enter();
            let view = self.embedding.view();
            mutation.prepare(&view, self.embedding, &mut rng)
        };
        self.statistics.increment(Counters::MutationsPrepared);
        if promising {
            self.statistics.increment(Counters::MutationsPromising);
            round.ready.lock().push(Prepared {
                improvement: mutation.improvement(),
                sequence,
                requeues,
                mutation,
            });
        } else {
            round.outstanding.fetch_sub(1, AtomicOrdering::AcqRel);
        }
    }

    fn incorporate<F>(&self, round: &Round, requeue: F) -> usize
    where
        F: Fn(Pending),
    {
        let mut executed = 0;
        while round.outstanding.load(AtomicOrdering::Acquire) > 0 {
            let next = round.ready.lock().pop();
            let Some(prepared) = next else {
                std::thread::yield_now();
                continue;
            };

            let applied = {
                let view = self.embedding.view();
                if prepared.mutation.is_valid(&view) {
                    prepared.mutation.execute(&view, self.embedding);
                    true
                } else {
                    false
                }
            };

            if applied {
                executed += 1;
                self.statistics.increment(Counters::MutationsExecuted);
                self.barrier.drain();
                self.embedding.synchronize();
                self.statistics.increment(Counters::Synchronizations);
                self.barrier.open();
                round.outstanding.fetch_sub(1, AtomicOrdering::AcqRel);
            } else if prepared.requeues < self.config.max_requeues {
                self.statistics.increment(Counters::MutationsInvalidated);
                self.statistics.increment(Counters::MutationsRequeued);
                requeue(self.pending(prepared.mutation, prepared.requeues + 1));
            } else {
                self.statistics.increment(Counters::MutationsInvalidated);
                self.statistics.increment(Counters::MutationsDiscarded);
                round.outstanding.fetch_sub(1, AtomicOrdering::AcqRel);
            }
        }
        executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::generators::king;
    use crate::graph::Graph;
    use crate::mutation::{round_mutations, FrontierShifting, RoundKind};
    use crate::state::{Chain, EmbeddingState, EmbeddingView};

    fn unbalanced() -> EmbeddingManager {
        let source = Graph::from_edges([(0, 1)]);
        let mut state = EmbeddingState::new(&source, &king(1, 8)).unwrap();
        state.map_node(0, 0).unwrap();
        state.map_node_to_chain(1, &Chain::from([1, 2, 3, 4])).unwrap();
        EmbeddingManager::new(state, 16)
    }

    fn total_length(view: &dyn EmbeddingView) -> usize {
        view.mapping().values().map(|chain| chain.len()).sum()
    }

    fn run_round(threads: usize) {
        let embedding = unbalanced();
        let config = EmbeddingConfig::default().with_threads(threads);
        let statistics = Statistics::new();
        let manager = MutationManager::new(&embedding, &config, &statistics);
        assert_eq!(manager.is_parallel(), threads > 1);

        let mutations = {
            let view = embedding.view();
            round_mutations(&view, &config, RoundKind::Refinement)
        };
        let executed = manager.run(mutations);
        assert!(executed >= 1);
        assert_eq!(statistics.get(Counters::MutationsExecuted), executed as u64);
        assert_eq!(statistics.get(Counters::Synchronizations), executed as u64);
        assert!(statistics.get(Counters::MutationsPrepared) >= 3);

        let view = embedding.view();
        assert!(view.is_valid_embedding());
        assert!(total_length(&view) <= 3);
    }

    #[test]
    fn test_sequential_round() {
        run_round(1);
    }

    #[test]
    fn test_parallel_round() {
        run_round(4);
    }

    #[test]
    fn test_pool_is_shared_across_rounds() {
        let embedding = unbalanced();
        let config = EmbeddingConfig::default().with_threads(2);
        let statistics = Statistics::new();
        let pool = preparer_pool(&config);
        assert!(pool.is_some());
        assert!(preparer_pool(&config.clone().with_threads(1)).is_none());

        let mut executed = 0;
        for _ in 0..3 {
            let manager = MutationManager::with_pool(&embedding, &config, &statistics, pool.clone());
            assert!(manager.is_parallel());
            assert_eq!(pool.as_ref().map(Arc::strong_count), Some(2));
            let mutations = round_mutations(&embedding.view(), &config, RoundKind::Refinement);
            executed += manager.run(mutations);
        }
        assert_eq!(pool.as_ref().map(Arc::strong_count), Some(1));
        assert!(executed >= 1);
        assert!(embedding.view().is_valid_embedding());
    }

    #[test]
    fn test_empty_round() {
        let embedding = unbalanced();
        let config = EmbeddingConfig::default().with_threads(2);
        let statistics = Statistics::new();
        let manager = MutationManager::new(&embedding, &config, &statistics);
        assert_eq!(manager.run(Vec::new()), 0);
        assert_eq!(statistics.get(Counters::MutationsPrepared), 0);
    }

    #[test]
    fn test_conflicting_plans_are_revalidated() {
        // Two identical shifts: the second is stale once the first executes
        let embedding = unbalanced();
        let config = EmbeddingConfig::default().with_threads(1).with_max_requeues(0);
        let statistics = Statistics::new();
        let manager = MutationManager::new(&embedding, &config, &statistics);
        let executed = manager.run(vec![
            Box::new(FrontierShifting::new(0)),
            Box::new(FrontierShifting::new(0)),
        ]);
        assert_eq!(executed, 1);
        assert_eq!(statistics.get(Counters::MutationsDiscarded), 1);
        assert_eq!(embedding.view().chain(0), Some(&Chain::from([0, 1])));
    }

    #[test]
    fn test_priority_order() {
        let prepared = |improvement, sequence| Prepared {
            improvement,
            sequence,
            requeues: 0,
            mutation: Box::new(FrontierShifting::new(0)),
        };
        let mut heap = BinaryHeap::new();
        heap.push(prepared(-1, 0));
        heap.push(prepared(-5, 2));
        heap.push(prepared(-5, 1));
        let order: Vec<u64> = std::iter::from_fn(|| heap.pop().map(|p| p.sequence)).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_seeds_differ_per_sequence() {
        assert_ne!(mutation_seed(7, 0), mutation_seed(7, 1));
        assert_eq!(mutation_seed(7, 3), mutation_seed(7, 3));
    }
}
