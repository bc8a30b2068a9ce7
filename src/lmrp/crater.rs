// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Craters: balls of target vertices selected for tear-down, and the
//! registry that keeps concurrent repairs on disjoint regions.

use crate::graph::{AdjacencyList, Vertex};
use log::debug;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

/// Target vertices within `radius` hops of `center`.
pub fn crater_around(adjacency: &AdjacencyList, center: Vertex, radius: usize) -> BTreeSet<Vertex> {
    let mut crater = BTreeSet::new();
    if !adjacency.contains_vertex(center) {
        return crater;
    }
    let mut queue = VecDeque::from([(center, 0)]);
    crater.insert(center);
    while let Some((v, depth)) = queue.pop_front() {
        if depth == radius {
            continue;
        }
        for &n in adjacency.neighbors(v) {
            if crater.insert(n) {
                queue.push_back((n, depth + 1));
            }
        }
    }
    crater
}

/// Vertices outside `crater` adjacent to some vertex inside it.
pub fn border_of(adjacency: &AdjacencyList, crater: &BTreeSet<Vertex>) -> BTreeSet<Vertex> {
    crater
        .iter()
        .flat_map(|&v| adjacency.neighbors(v).iter().copied())
        .filter(|n| !crater.contains(n))
        .collect()
}

pub type ClaimId = u64;

/// Which target vertices are being repaired, and by whom.
///
/// Lookups take the read lock, so many workers can test regions at once;
/// claiming takes the write lock and re-checks.
#[derive(Debug, Default)]
pub struct CraterRegistry {
    claims: RwLock<HashMap<Vertex, ClaimId>>,
    next_id: AtomicU64,
}

/// A region held by one repair. Released on drop.
#[derive(Debug)]
pub struct CraterClaim<'a> {
    registry: &'a CraterRegistry,
    id: ClaimId,
    region: BTreeSet<Vertex>,
}

impl CraterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_claimed(&self, target: Vertex) -> bool {
        self.claims.read().contains_key(&target)
    }

    /// Number of claimed vertices.
    pub fn claimed(&self) -> usize {
        self.claims.read().len()
    }

    /// Claim every vertex of `region`, or nothing if any is already held.
    pub fn try_claim(&self, region: BTreeSet<Vertex>) -> Option<CraterClaim<'_>> {
        {
            let claims = self.claims.read();
            if region.iter().any(|v| claims.contains_key(v)) {
                debug!("crater claim rejected on read");
                return None;
            }
        }
        let mut claims = self.claims.write();
        if region.iter().any(|v| claims.contains_key(v)) {
            debug!("crater claim rejected on write");
            return None;
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        for &v in &region {
            claims.insert(v, id);
        }
        Some(CraterClaim {
            registry: self,
            id,
            region,
        })
    }
}

impl CraterClaim<'_> {
    pub fn id(&self) -> ClaimId {
        self.id
    }

    pub fn region(&self) -> &BTreeSet<Vertex> {
        &self.region
    }
}

impl Drop for CraterClaim<'_> {
    fn drop(&mut self) {
        let mut claims = self.registry.claims.write();
        for v in &self.region {
            if claims.get(v) == Some(&self.id) {
                claims.remove(v);
            }
        }
    }
}
