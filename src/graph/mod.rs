// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Graph primitives shared by every stage of the embedding engine.
//!
//! A [`Graph`] is a set of undirected edges. Algorithms never walk the edge
//! set directly: they build an [`AdjacencyList`] once (both directions of
//! every edge inserted) and query neighbour ranges from it.
//!
//! - `cut_vertex`: articulation points via an explicit-stack DFS
//! - `generators`: standard hardware and test topologies
//! - `parse`: bracketed edge-list import

pub mod cut_vertex;
pub mod generators;
pub mod parse;

pub use cut_vertex::{identify_cut_vertices, is_cut_vertex, is_cut_vertex_within};
pub use parse::{load_edge_list, parse_edge_list};

use std::collections::{BTreeMap, BTreeSet};

/// Vertex identifier. Dense but not necessarily contiguous.
pub type Vertex = u32;

/// Sentinel for "no vertex".
pub const UNDEFINED_NODE: Vertex = Vertex::MAX;

/// An unordered pair of vertices, stored with the smaller endpoint first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    u: Vertex,
    v: Vertex,
}

impl Edge {
    /// Create an edge; endpoint order does not matter.
    pub fn new(a: Vertex, b: Vertex) -> Self {
        if a <= b {
            Self { u: a, v: b }
        } else {
            Self { u: b, v: a }
        }
    }

    /// The smaller endpoint.
    pub fn u(&self) -> Vertex {
        self.u
    }

    /// The larger endpoint.
    pub fn v(&self) -> Vertex {
        self.v
    }

    /// Whether both endpoints coincide.
    pub fn is_self_loop(&self) -> bool {
        self.u == self.v
    }

    /// The endpoint opposite to `w`, if `w` is an endpoint.
    pub fn other(&self, w: Vertex) -> Option<Vertex> {
        if w == self.u {
            Some(self.v)
        } else if w == self.v {
            Some(self.u)
        } else {
            None
        }
    }
}

/// An undirected graph as a set of edges.
///
/// Iteration order is deterministic (sorted by edge), which keeps seeded runs
/// reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    edges: BTreeSet<Edge>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from endpoint pairs. Duplicates collapse.
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = (Vertex, Vertex)>,
    {
        Self {
            edges: edges.into_iter().map(|(a, b)| Edge::new(a, b)).collect(),
        }
    }

    /// Insert an edge. Returns false if it was already present.
    pub fn insert(&mut self, a: Vertex, b: Vertex) -> bool {
        self.edges.insert(Edge::new(a, b))
    }

    /// Whether the edge {a, b} is present.
    pub fn contains(&self, a: Vertex, b: Vertex) -> bool {
        self.edges.contains(&Edge::new(a, b))
    }

    /// Number of edges.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no edges.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Iterate over the edges in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// The set of vertices touched by some edge.
    pub fn vertices(&self) -> BTreeSet<Vertex> {
        let mut vertices = BTreeSet::new();
        for edge in &self.edges {
            vertices.insert(edge.u);
            vertices.insert(edge.v);
        }
        vertices
    }
}

impl FromIterator<(Vertex, Vertex)> for Graph {
    fn from_iter<I: IntoIterator<Item = (Vertex, Vertex)>>(iter: I) -> Self {
        Self::from_edges(iter)
    }
}

/// Symmetric adjacency multimap derived from a [`Graph`].
///
/// For every edge {u, v} of the graph both `u -> v` and `v -> u` are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjacencyList {
    neighbors: BTreeMap<Vertex, Vec<Vertex>>,
}

impl AdjacencyList {
    /// Create an empty adjacency list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the symmetric adjacency of a graph.
    pub fn from_graph(graph: &Graph) -> Self {
        let mut adjacency = Self::new();
        for edge in graph.iter() {
            adjacency.insert_edge(edge.u(), edge.v());
        }
        adjacency
    }

    /// Insert both directions of an edge.
    pub fn insert_edge(&mut self, a: Vertex, b: Vertex) {
        self.insert_arc(a, b);
        self.insert_arc(b, a);
    }

    /// Insert a single direction `from -> to`.
    pub fn insert_arc(&mut self, from: Vertex, to: Vertex) {
        self.neighbors.entry(from).or_default().push(to);
    }

    /// Register a vertex without neighbours.
    pub fn insert_vertex(&mut self, v: Vertex) {
        self.neighbors.entry(v).or_default();
    }

    /// Neighbours of `v` (empty if `v` is unknown).
    pub fn neighbors(&self, v: Vertex) -> &[Vertex] {
        self.neighbors.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `v` has an entry.
    pub fn contains_vertex(&self, v: Vertex) -> bool {
        self.neighbors.contains_key(&v)
    }

    /// Whether `b` is listed as a neighbour of `a`.
    pub fn are_adjacent(&self, a: Vertex, b: Vertex) -> bool {
        self.neighbors(a).contains(&b)
    }

    /// Number of neighbour entries of `v`.
    pub fn degree(&self, v: Vertex) -> usize {
        self.neighbors(v).len()
    }

    /// Iterate over the vertices with an entry, in sorted order.
    pub fn vertices(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.neighbors.keys().copied()
    }

    /// Number of vertices with an entry.
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Whether no vertex has an entry.
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

impl From<&Graph> for AdjacencyList {
    fn from(graph: &Graph) -> Self {
        Self::from_graph(graph)
    }
}
