// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Error types for embedding construction.
//!
//! Only contract violations are errors: malformed input graphs, broken
//! internal invariants and infeasible flow instances. A heuristic that finds
//! nothing better reports that through a `bool`, never through this type.

use crate::graph::Vertex;
use thiserror::Error;

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while building or refining an embedding.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// A connectivity query was handed a subgraph that is not connected.
    #[error("subgraph is disconnected: visited {visited} of {expected} vertices")]
    DisconnectedSubgraph {
        /// Vertices reached by the search.
        visited: usize,
        /// Vertices the caller claimed the subgraph has.
        expected: usize,
    },

    /// A subgraph contains an edge from a vertex to itself.
    #[error("self-loop at vertex {vertex}")]
    SelfLoop {
        /// The looping vertex.
        vertex: Vertex,
    },

    /// A complex placement was requested for a vertex with no embedded neighbour.
    #[error("source vertex {vertex} has no embedded neighbour to connect to")]
    IsolatedNode {
        /// The source vertex being placed.
        vertex: Vertex,
    },

    /// The flow network built for a placement cannot route the required flow.
    #[error("flow instance for source vertex {vertex} is infeasible")]
    InfeasibleFlow {
        /// The source vertex being placed.
        vertex: Vertex,
    },

    /// The flow network built for a placement has an unbounded optimum.
    #[error("flow instance for source vertex {vertex} is unbounded")]
    UnboundedFlow {
        /// The source vertex being placed.
        vertex: Vertex,
    },

    /// An edge list could not be parsed; carries the line and column.
    #[error("malformed edge list: {0}")]
    Parse(#[from] serde_json::Error),

    /// A graph needed for embedding has no edges.
    #[error("{role} graph is empty")]
    EmptyGraph {
        /// Which graph ("source" or "target").
        role: &'static str,
    },

    /// A vertex is not part of the graph it was looked up in.
    #[error("vertex {vertex} is not part of the graph")]
    UnknownVertex {
        /// The missing vertex.
        vertex: Vertex,
    },

    /// IO error while importing a graph.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
