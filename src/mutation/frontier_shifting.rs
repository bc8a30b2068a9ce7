// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Move a contested target vertex between two chains.
//!
//! The *conqueror* is the chain the mutation is built for. A *contested*
//! vertex belongs to some *victim* chain and is either
//! - adjacent to the conqueror and owned by the victim alone: it is
//!   transferred to the conqueror, or
//! - already shared by conqueror and victim: the victim drops it.
//!
//! The victim must be able to spare the vertex: it keeps at least two
//! vertices, stays connected, and keeps a target edge to every neighbour
//! chain other than the conqueror.

use super::{removal_delta, transfer_delta, Mutation, MutationKind};
use crate::graph::Vertex;
use crate::state::{CandidateCache, CandidateList, EmbeddingView, MutationSink};
use rand::rngs::StdRng;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shift {
    Transfer,
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Plan {
    victim: Vertex,
    target: Vertex,
    shift: Shift,
    improvement: i64,
}

/// Frontier shifting in favour of one conqueror chain.
#[derive(Debug, Clone)]
pub struct FrontierShifting {
    conqueror: Vertex,
    plan: Option<Plan>,
    prepared_at: u64,
}

impl FrontierShifting {
    pub fn new(conqueror: Vertex) -> Self {
        Self {
            conqueror,
            plan: None,
            prepared_at: 0,
        }
    }

    /// `(victim, target)` of the prepared plan.
    pub fn planned(&self) -> Option<(Vertex, Vertex)> {
        self.plan.map(|plan| (plan.victim, plan.target))
    }
}

/// Target vertices contested between `conqueror` and some other chain.
fn contested_targets(view: &dyn EmbeddingView, conqueror: Vertex) -> Vec<Vertex> {
    let mut contested = BTreeSet::new();
    let Some(chain) = view.chain(conqueror) else {
        return Vec::new();
    };
    for &t in chain {
        if view.overlap(t) > 1 {
            contested.insert(t);
        }
    }
    view.for_each_target_neighbor(conqueror, &mut |_, n| {
        if view.is_occupied(n) {
            contested.insert(n);
        }
    });
    contested.into_iter().collect()
}

/// Whether `victim` can give up `target`, ignoring its edge to `conqueror`.
fn can_spare(view: &dyn EmbeddingView, victim: Vertex, target: Vertex, conqueror: Vertex) -> bool {
    view.chain(victim)
        .is_some_and(|chain| chain.len() >= 2 && chain.contains(&target))
        && !view.is_cut_vertex_in_chain(victim, target)
        && !view.is_crucial(victim, target, Some(conqueror))
}

/// The best shift of `target` from any victim to `conqueror`, if beneficial.
fn evaluate(view: &dyn EmbeddingView, conqueror: Vertex, target: Vertex) -> Option<Plan> {
    let owners = view.owners(target)?;
    let conqueror_len = view.chain_len(conqueror);
    let shared = owners.contains(&conqueror);
    if !shared && (owners.len() != 1 || !view.touches_chain(target, conqueror)) {
        return None;
    }

    owners
        .iter()
        .copied()
        .filter(|&victim| victim != conqueror)
        .filter(|&victim| can_spare(view, victim, target, conqueror))
        .map(|victim| {
            let victim_len = view.chain_len(victim);
            let (shift, improvement) = if shared {
                (Shift::Drop, removal_delta(victim_len))
            } else {
                (Shift::Transfer, transfer_delta(victim_len, conqueror_len))
            };
            Plan {
                victim,
                target,
                shift,
                improvement,
            }
        })
        .filter(|plan| plan.improvement < 0)
        .min_by_key(|plan| (plan.improvement, plan.victim))
}

impl Mutation for FrontierShifting {
    fn kind(&self) -> MutationKind {
        MutationKind::FrontierShifting
    }

    fn node(&self) -> Vertex {
        self.conqueror
    }

    fn prepare(
        &mut self,
        view: &dyn EmbeddingView,
        cache: &dyn CandidateCache,
        _rng: &mut StdRng,
    ) -> bool {
        self.plan = None;
        self.prepared_at = view.clock();

        // A cached list is reusable while the conqueror's chain is unchanged;
        // each entry is still evaluated against the live state.
        let candidates = match cache.cached_candidates(self.conqueror) {
            Some(list) if list.clock >= view.source_stamp(self.conqueror) => list.targets,
            _ => {
                let targets = contested_targets(view, self.conqueror);
                cache.store_candidates(
                    self.conqueror,
                    CandidateList {
                        clock: view.clock(),
                        targets: targets.clone(),
                    },
                );
                targets
            }
        };

        self.plan = candidates
            .into_iter()
            .filter_map(|target| evaluate(view, self.conqueror, target))
            .min_by_key(|plan| (plan.improvement, plan.target));
        self.plan.is_some()
    }

    fn improvement(&self) -> i64 {
        self.plan.map_or(0, |plan| plan.improvement)
    }

    fn is_valid(&self, view: &dyn EmbeddingView) -> bool {
        let Some(plan) = self.plan else {
            return false;
        };
        // Nothing the plan depends on has changed since it was prepared
        let unchanged = |source: Vertex| view.source_stamp(source) <= self.prepared_at;
        if unchanged(self.conqueror)
            && unchanged(plan.victim)
            && view.target_stamp(plan.target) <= self.prepared_at
            && view
                .source_adjacency()
                .neighbors(plan.victim)
                .iter()
                .all(|&n| unchanged(n))
        {
            return true;
        }
        evaluate(view, self.conqueror, plan.target).is_some_and(|live| {
            live.victim == plan.victim && live.shift == plan.shift
        })
    }

    fn execute(&self, _view: &dyn EmbeddingView, sink: &dyn MutationSink) {
        let Some(plan) = self.plan else {
            return;
        };
        sink.delete_mapping_pair(plan.victim, plan.target);
        if plan.shift == Shift::Transfer {
            sink.insert_mapping_pair(self.conqueror, plan.target);
            sink.occupy_node(plan.target);
        }
        sink.commit();
    }
}
