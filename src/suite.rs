// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Top-level entry point.
//!
//! [`EmbeddingSuite::find_embedding`] runs the whole pipeline:
//!
//! 1. the constructive phase places every source vertex, optionally
//!    interleaved with construction mutation rounds
//! 2. refinement passes, each made of
//!    - a concurrent mutation round (frontier shifting, overlap reduction)
//!    - parallel crater repairs around the remaining defects
//!    - rip-up and re-placement of the chains still in conflict
//!
//! until the embedding is valid, the pass budget is spent, or passes stop
//! making progress.

use crate::config::EmbeddingConfig;
use crate::error::Result;
use crate::graph::cut_vertex::is_connected_within;
use crate::graph::{AdjacencyList, Graph, Vertex};
use crate::lmrp::{crater_around, CraterClaim, CraterRegistry, LmrpHeuristic};
use crate::mutation::{preparer_pool, round_mutations, MutationManager, RoundKind};
use crate::placer::SuperVertexPlacer;
use crate::state::{Chain, EmbeddingManager, EmbeddingState, EmbeddingView, Mapping};
use crate::statistics::{Counters, Statistics};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Passes without progress before the suite gives up.
const MAX_STALLED_PASSES: usize = 4;

/// A crater repair staged on the change log, holding its claim.
struct StagedRepair<'r> {
    _claim: CraterClaim<'r>,
    sources: BTreeSet<Vertex>,
}

/// The result of a run: source vertex -> chain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Embedding {
    mapping: Mapping,
}

impl Embedding {
    pub fn new(mapping: Mapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn into_mapping(self) -> Mapping {
        self.mapping
    }

    pub fn chain(&self, source: Vertex) -> Option<&Chain> {
        self.mapping.get(&source)
    }

    /// Target vertices owned by more than one chain.
    pub fn overlap_count(&self) -> usize {
        let mut owners: BTreeMap<Vertex, usize> = BTreeMap::new();
        for chain in self.mapping.values() {
            for &t in chain {
                *owners.entry(t).or_default() += 1;
            }
        }
        owners.values().filter(|&&n| n > 1).count()
    }

    /// Sum of the chain lengths.
    pub fn total_length(&self) -> usize {
        self.mapping.values().map(BTreeSet::len).sum()
    }

    pub fn max_chain_length(&self) -> usize {
        self.mapping.values().map(BTreeSet::len).max().unwrap_or(0)
    }

    /// Whether this is a minor embedding of `source` in `target`: every
    /// source vertex has a non-empty connected chain of target vertices,
    /// chains are disjoint, and every source edge joins its two chains by a
    /// target edge.
    pub fn is_valid(&self, source: &Graph, target: &Graph) -> bool {
        let adjacency = AdjacencyList::from_graph(target);
        let chains_ok = source.vertices().iter().all(|s| {
            self.chain(*s).is_some_and(|chain| {
                !chain.is_empty()
                    && chain.iter().all(|&t| adjacency.contains_vertex(t))
                    && is_connected_within(&adjacency, chain)
            })
        });
        let edges_ok = source.iter().filter(|e| !e.is_self_loop()).all(|edge| {
            match (self.chain(edge.u()), self.chain(edge.v())) {
                (Some(a), Some(b)) => a.iter().any(|&t| {
                    adjacency
                        .neighbors(t)
                        .iter()
                        .any(|n| b.contains(n))
                }),
                _ => false,
            }
        });
        chains_ok && self.overlap_count() == 0 && edges_ok
    }
}

/// One embedding problem: a source graph, a target graph and the tunables.
#[derive(Debug)]
pub struct EmbeddingSuite {
    source: Graph,
    target: Graph,
    config: EmbeddingConfig,
    statistics: Statistics,
}

impl EmbeddingSuite {
    pub fn new(source: Graph, target: Graph, config: EmbeddingConfig) -> Self {
        Self {
            source,
            target,
            config,
            statistics: Statistics::new(),
        }
    }

    pub fn source(&self) -> &Graph {
        &self.source
    }

    pub fn target(&self) -> &Graph {
        &self.target
    }

    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Counters accumulated over every run of this suite.
    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Embed the source graph in the target graph.
    ///
    /// Returns the best mapping reached; check [`Embedding::is_valid`] to
    /// know whether it is a minor embedding.
    ///
    /// # Errors
    ///
    /// Contract violations only: empty graphs, self-loops, and flow
    /// instances that cannot be solved (e.g. a disconnected target).
    pub fn find_embedding(&self) -> Result<Embedding> {
        let state = EmbeddingState::new(&self.source, &self.target)?;
        let mut placer = SuperVertexPlacer::new(&state, &self.config, &self.statistics);
        let mut embedding = EmbeddingManager::new(state, self.config.candidate_cache_capacity);
        // One preparer pool serves every mutation round of the run
        let pool = preparer_pool(&self.config);

        self.construct(&mut placer, &mut embedding, pool.as_ref())?;
        info!(
            "constructed {} chains: {}",
            embedding.view().mapping().len(),
            self.statistics
        );

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut stalled = 0;
        for pass in 0..self.config.max_passes {
            let before = defect_score(&embedding.view());
            if before.0 == 0 {
                break;
            }

            let executed = {
                let mutations = MutationManager::with_pool(
                    &embedding,
                    &self.config,
                    &self.statistics,
                    pool.clone(),
                );
                let round = round_mutations(&embedding.view(), &self.config, RoundKind::Refinement);
                mutations.run(round)
            };
            let radius = self.config.crater_radius + stalled;
            let repaired = self.repair_craters(&embedding, radius);
            let replaced = self.rip_up(&mut placer, embedding.state_mut(), &mut rng)?;

            let after = defect_score(&embedding.view());
            info!(
                "pass {}: {} mutations, {} craters (radius {}), {} re-placed; defects {} -> {}, length {}",
                pass, executed, repaired, radius, replaced, before.0, after.0, after.1
            );
            if after < before {
                stalled = 0;
            } else {
                stalled += 1;
                if stalled >= MAX_STALLED_PASSES {
                    warn!("no progress in {} passes, stopping", stalled);
                    break;
                }
            }
        }

        let state = embedding.into_state();
        if !state.is_valid_embedding() {
            warn!("no valid embedding found: {}", self.statistics);
        }
        Ok(Embedding::new(state.into_mapping()))
    }

    fn construct(
        &self,
        placer: &mut SuperVertexPlacer<'_>,
        embedding: &mut EmbeddingManager,
        pool: Option<&Arc<rayon::ThreadPool>>,
    ) -> Result<()> {
        let Some(interval) = self.config.construction_mutation_interval else {
            placer.place_all(embedding.state_mut())?;
            return Ok(());
        };
        let mut placed = 0;
        while placer.place_next(embedding.state_mut())?.is_some() {
            placed += 1;
            if placed % interval == 0 {
                let mutations = MutationManager::with_pool(
                    embedding,
                    &self.config,
                    &self.statistics,
                    pool.cloned(),
                );
                let round =
                    round_mutations(&embedding.view(), &self.config, RoundKind::Construction);
                let executed = mutations.run(round);
                debug!("construction round after {} placements: {} executed", placed, executed);
            }
        }
        Ok(())
    }

    /// Repair craters of `radius` around every defect, in parallel where
    /// the craters are disjoint. Returns the number of repairs applied.
    pub fn repair_craters(&self, embedding: &EmbeddingManager, radius: usize) -> usize {
        let registry = CraterRegistry::new();
        let staged = self.stage_repairs(embedding, &registry, radius);
        let repaired = staged.len();
        if repaired > 0 {
            let chains: usize = staged.iter().map(|repair| repair.sources.len()).sum();
            debug!("{} crater repairs staged over {} chains", repaired, chains);
            // Claims stay held until the staged chains are applied
            embedding.synchronize();
            self.statistics.add(Counters::CratersRepaired, repaired as u64);
        }
        drop(staged);
        repaired
    }

    /// Stage one repair per claimable crater. Each returned repair keeps its
    /// region claimed, so no two of them touch the same chain.
    fn stage_repairs<'r>(
        &self,
        embedding: &EmbeddingManager,
        registry: &'r CraterRegistry,
        radius: usize,
    ) -> Vec<StagedRepair<'r>> {
        let view = embedding.view();
        let centers = defect_centers(&view);
        centers
            .par_iter()
            .filter_map(|&center| {
                let crater = crater_around(view.target_adjacency(), center, radius);
                let mut lmrp = LmrpHeuristic::new(&view, crater);
                let mut region: BTreeSet<Vertex> = lmrp.crater().clone();
                region.extend(lmrp.border().iter().copied());
                for &s in lmrp.affected() {
                    region.extend(view.chain(s).into_iter().flatten().copied());
                }
                let Some(claim) = registry.try_claim(region) else {
                    self.statistics.increment(Counters::CraterClaimsRejected);
                    return None;
                };
                if lmrp.optimize() && lmrp.improves() {
                    lmrp.stage(embedding);
                    Some(StagedRepair {
                        _claim: claim,
                        sources: lmrp.affected().clone(),
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Re-place every source vertex involved in a defect, in random order.
    fn rip_up(
        &self,
        placer: &mut SuperVertexPlacer<'_>,
        state: &mut EmbeddingState,
        rng: &mut StdRng,
    ) -> Result<usize> {
        let mut troubled: Vec<Vertex> = defect_sources(&*state).into_iter().collect();
        troubled.shuffle(rng);
        for &node in &troubled {
            placer.replace_node(state, node)?;
        }
        Ok(troubled.len())
    }
}

/// `(defects, total chain length)`; an embedding is valid when the first is 0.
///
/// Defects are shared target vertices, unrealised source edges, disconnected
/// chains and unmapped source vertices.
pub fn defect_score(view: &dyn EmbeddingView) -> (usize, usize) {
    let overlaps = view.overlapping_targets().len();
    let unmapped = view.remaining_source_nodes().len();
    let disconnected = view
        .mapping()
        .keys()
        .filter(|&&s| !view.chain_connected(s))
        .count();
    let missing = unrealised_edges(view).len();
    let length = view.mapping().values().map(BTreeSet::len).sum();
    (overlaps + unmapped + disconnected + missing, length)
}

fn unrealised_edges(view: &dyn EmbeddingView) -> Vec<(Vertex, Vertex)> {
    let adjacency = view.source_adjacency();
    let mut missing = Vec::new();
    for a in adjacency.vertices() {
        for &b in adjacency.neighbors(a) {
            if a < b && view.is_mapped(a) && view.is_mapped(b) && !view.chains_adjacent(a, b) {
                missing.push((a, b));
            }
        }
    }
    missing
}

/// Target vertices to centre crater repairs on.
fn defect_centers(view: &dyn EmbeddingView) -> Vec<Vertex> {
    let mut centers = view.overlapping_targets();
    for (a, _) in unrealised_edges(view) {
        centers.extend(view.chain(a).and_then(|chain| chain.first().copied()));
    }
    centers.into_iter().collect()
}

/// Source vertices whose chain takes part in some defect.
fn defect_sources(view: &dyn EmbeddingView) -> BTreeSet<Vertex> {
    let mut sources = BTreeSet::new();
    for t in view.overlapping_targets() {
        sources.extend(view.owners(t).into_iter().flatten().copied());
    }
    for (a, b) in unrealised_edges(view) {
        sources.insert(a);
        sources.insert(b);
    }
    for &s in view.mapping().keys() {
        if !view.chain_connected(s) {
            sources.insert(s);
        }
    }
    sources.extend(view.remaining_source_nodes().iter().copied());
    sources
}
