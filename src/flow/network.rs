// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! A small min-cost-flow solver.
//!
//! Nodes carry a supply (positive) or demand (negative). Arcs carry a
//! capacity and a per-unit cost. [`FlowNetwork::solve`] routes every unit of
//! supply to a demand at minimum total cost using successive shortest
//! paths; each path is found with SPFA over the residual network, which also
//! detects negative-cost cycles.
//!
//! Arcs are stored in pairs: arc `a` and its residual twin `a ^ 1`. Only the
//! even ids are handed out.

use std::collections::VecDeque;

pub type NodeId = usize;
pub type ArcId = usize;

/// Capacity treated as unbounded.
pub const INFINITE_CAPACITY: i64 = i64::MAX / 4;

/// Outcome of [`FlowNetwork::solve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowStatus {
    /// All supply routed at minimum cost.
    Optimal,
    /// Supplies and demands cannot be balanced within the capacities.
    Infeasible,
    /// The residual network has a negative-cost cycle.
    Unbounded,
}

/// A directed network with supplies, capacities and costs.
#[derive(Debug, Clone, Default)]
pub struct FlowNetwork {
    tails: Vec<NodeId>,
    heads: Vec<NodeId>,
    capacities: Vec<i64>,
    costs: Vec<i64>,
    flows: Vec<i64>,
    outgoing: Vec<Vec<ArcId>>,
    supplies: Vec<i64>,
}

impl FlowNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self) -> NodeId {
        self.outgoing.push(Vec::new());
        self.supplies.push(0);
        self.outgoing.len() - 1
    }

    pub fn node_count(&self) -> usize {
        self.outgoing.len()
    }

    /// Number of arcs added (residual twins not counted).
    pub fn arc_count(&self) -> usize {
        self.heads.len() / 2
    }

    fn push_arc(&mut self, tail: NodeId, head: NodeId, capacity: i64, cost: i64) -> ArcId {
        let id = self.heads.len();
        self.tails.push(tail);
        self.heads.push(head);
        self.capacities.push(capacity);
        self.costs.push(cost);
        self.flows.push(0);
        self.outgoing[tail].push(id);
        id
    }

    /// Add the arc `tail -> head`.
    pub fn add_arc(&mut self, tail: NodeId, head: NodeId, capacity: i64, cost: i64) -> ArcId {
        debug_assert!(tail < self.node_count() && head < self.node_count());
        let id = self.push_arc(tail, head, capacity, cost);
        self.push_arc(head, tail, 0, -cost);
        id
    }

    pub fn tail(&self, arc: ArcId) -> NodeId {
        self.tails[arc]
    }

    pub fn head(&self, arc: ArcId) -> NodeId {
        self.heads[arc]
    }

    pub fn set_capacity(&mut self, arc: ArcId, capacity: i64) {
        self.capacities[arc] = capacity;
    }

    pub fn set_cost(&mut self, arc: ArcId, cost: i64) {
        self.costs[arc] = cost;
        self.costs[arc ^ 1] = -cost;
    }

    pub fn set_supply(&mut self, node: NodeId, supply: i64) {
        self.supplies[node] = supply;
    }

    /// Flow on `arc` after the last [`solve`](Self::solve).
    pub fn flow(&self, arc: ArcId) -> i64 {
        self.flows[arc]
    }

    /// Total cost of the current flow.
    pub fn total_cost(&self) -> i64 {
        (0..self.heads.len())
            .step_by(2)
            .map(|arc| self.flows[arc] * self.costs[arc])
            .sum()
    }

    fn residual(&self, arc: ArcId) -> i64 {
        self.capacities[arc] - self.flows[arc]
    }

    fn augment(&mut self, arc: ArcId, amount: i64) {
        self.flows[arc] += amount;
        self.flows[arc ^ 1] -= amount;
    }

    /// Route all supplies to demands at minimum cost.
    ///
    /// Previous flows are discarded. On `Infeasible` or `Unbounded` the flows
    /// left on the arcs are a partial solution and should not be used.
    pub fn solve(&mut self) -> FlowStatus {
        self.flows.iter_mut().for_each(|f| *f = 0);

        let required: i64 = self.supplies.iter().filter(|s| **s > 0).sum();
        let demanded: i64 = -self.supplies.iter().filter(|s| **s < 0).sum::<i64>();
        if required != demanded {
            return FlowStatus::Infeasible;
        }

        // Temporary super terminals wired to every supply and demand node
        let base_arcs = self.heads.len();
        let super_source = self.add_node();
        let super_sink = self.add_node();
        for node in 0..super_source {
            let supply = self.supplies[node];
            if supply > 0 {
                self.add_arc(super_source, node, supply, 0);
            } else if supply < 0 {
                self.add_arc(node, super_sink, -supply, 0);
            }
        }

        let mut routed = 0;
        let mut status = FlowStatus::Optimal;
        while routed < required {
            match self.shortest_path(super_source, super_sink) {
                PathSearch::Found(path) => {
                    let amount = path
                        .iter()
                        .map(|&arc| self.residual(arc))
                        .min()
                        .unwrap_or(0)
                        .min(required - routed);
                    if amount <= 0 {
                        status = FlowStatus::Infeasible;
                        break;
                    }
                    for &arc in &path {
                        self.augment(arc, amount);
                    }
                    routed += amount;
                }
                PathSearch::Unreachable => {
                    status = FlowStatus::Infeasible;
                    break;
                }
                PathSearch::NegativeCycle => {
                    status = FlowStatus::Unbounded;
                    break;
                }
            }
        }

        self.remove_super_terminals(base_arcs, super_source);
        status
    }

    fn remove_super_terminals(&mut self, base_arcs: usize, super_source: NodeId) {
        self.tails.truncate(base_arcs);
        self.heads.truncate(base_arcs);
        self.capacities.truncate(base_arcs);
        self.costs.truncate(base_arcs);
        self.flows.truncate(base_arcs);
        self.outgoing.truncate(super_source);
        self.supplies.truncate(super_source);
        for arcs in &mut self.outgoing {
            arcs.retain(|&arc| arc < base_arcs);
        }
    }

    /// SPFA from `from`; the path is returned as arc ids, `from` first.
    fn shortest_path(&self, from: NodeId, to: NodeId) -> PathSearch {
        let n = self.node_count();
        let mut distance = vec![i64::MAX; n];
        let mut via: Vec<Option<ArcId>> = vec![None; n];
        let mut hops = vec![0usize; n];
        let mut queued = vec![false; n];
        let mut queue = VecDeque::new();

        distance[from] = 0;
        queue.push_back(from);
        queued[from] = true;

        while let Some(node) = queue.pop_front() {
            queued[node] = false;
            for &arc in &self.outgoing[node] {
                if self.residual(arc) <= 0 {
                    continue;
                }
                let head = self.heads[arc];
                let candidate = distance[node] + self.costs[arc];
                if candidate < distance[head] {
                    distance[head] = candidate;
                    via[head] = Some(arc);
                    hops[head] = hops[node] + 1;
                    // A shortest path never needs n hops
                    if hops[head] >= n {
                        return PathSearch::NegativeCycle;
                    }
                    if !queued[head] {
                        queued[head] = true;
                        queue.push_back(head);
                    }
                }
            }
        }

        if distance[to] == i64::MAX {
            return PathSearch::Unreachable;
        }
        let mut path = Vec::new();
        let mut node = to;
        while let Some(arc) = via[node] {
            path.push(arc);
            node = self.tails[arc];
        }
        path.reverse();
        PathSearch::Found(path)
    }
}

enum PathSearch {
    Found(Vec<ArcId>),
    Unreachable,
    NegativeCycle,
}
