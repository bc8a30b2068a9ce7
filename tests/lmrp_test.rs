// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Crater repairs on constructed embeddings.

mod common;

use common::{placed_state, sequential_config};
use minor_embedding::graph::generators::{chimera, complete, king, petersen};
use minor_embedding::lmrp::{crater_around, CraterRegistry, LmrpHeuristic};
use minor_embedding::{EmbeddingManager, EmbeddingSuite, EmbeddingView, Graph};

/// Every crater of every radius up to 3 must be repairable: the target is
/// connected, so paths always exist once overlaps are allowed.
fn assert_all_craters_repairable(source: &Graph, target: &Graph) {
    let state = placed_state(source, target, &sequential_config(9));
    for center in target.vertices().into_iter().step_by(3) {
        for radius in 0..=3 {
            let crater = crater_around(state.target_adjacency(), center, radius);
            let mut lmrp = LmrpHeuristic::new(&state, crater);
            assert!(
                lmrp.optimize(),
                "crater of radius {} at {} not repaired",
                radius,
                center
            );
            assert!(lmrp.components_connected());
            assert!(lmrp.destroyed_connected());
            assert!(lmrp.all_edges_embedded());
            assert!(lmrp.all_destroyed_embedded());
        }
    }
}

#[test]
fn test_craters_in_chimera() {
    assert_all_craters_repairable(&complete(6), &chimera(3, 3));
}

#[test]
fn test_craters_in_king_graph() {
    assert_all_craters_repairable(&petersen(), &king(5, 5));
}

#[test]
fn test_staged_repair_keeps_state_consistent() {
    let source = complete(5);
    let state = placed_state(&source, &chimera(2, 2), &sequential_config(4));
    let manager = EmbeddingManager::new(state, 0);
    let registry = CraterRegistry::new();

    let staged = {
        let view = manager.view();
        let centers: Vec<_> = view.target_adjacency().vertices().step_by(5).collect();
        let mut claims = Vec::new();
        let mut staged = 0;
        for center in centers {
            let crater = crater_around(view.target_adjacency(), center, 1);
            let mut lmrp = LmrpHeuristic::new(&view, crater);
            // Each chain may be rewritten by at most one repair
            let mut region = lmrp.crater().clone();
            region.extend(lmrp.border().iter().copied());
            for &s in lmrp.affected() {
                region.extend(view.chain(s).into_iter().flatten().copied());
            }
            let Some(claim) = registry.try_claim(region) else {
                continue;
            };
            claims.push(claim);
            if lmrp.optimize() && lmrp.improves() {
                lmrp.stage(&manager);
                staged += 1;
            }
        }
        staged
    };
    assert_eq!(manager.pending_commits(), staged);
    manager.synchronize();

    let state = manager.into_state();
    assert!(state.check_invariants());
    assert_eq!(state.mapping().len(), 5);
    assert!(state.chains_connected());
}

#[test]
fn test_parallel_crater_repairs_keep_chains_connected() {
    // Dense sources crowded into a small target: many overlapping craters
    for seed in 0..12 {
        let source = complete(6);
        let target = king(3, 4);
        let config = sequential_config(seed);
        let manager = EmbeddingManager::new(placed_state(&source, &target, &config), 0);
        let suite = EmbeddingSuite::new(source, target, config);
        for radius in [1, 2, 1] {
            suite.repair_craters(&manager, radius);
            let view = manager.view();
            assert!(view.chains_connected(), "seed {}: {:?}", seed, view.mapping());
        }
        let state = manager.into_state();
        assert!(state.check_invariants());
    }
}
