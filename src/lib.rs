// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Heuristic minor embedding of a source graph into a target graph.
//!
//! Each source vertex is mapped to a *chain*: a connected set of target
//! vertices. The embedding is valid when chains are disjoint and every source
//! edge is realised by at least one target edge between the two chains.
//! Targets are typically sparse hardware graphs such as Chimera lattices.
//!
//! # Architecture
//!
//! The work is split into two phases over one [`state::EmbeddingState`]:
//!
//! ## Construction
//!
//! [`placer::SuperVertexPlacer`] places source vertices one at a time. A
//! vertex with several embedded neighbours is placed by a min-cost flow
//! ([`flow`]) that grows one path from a representative target vertex to
//! each neighbour chain.
//!
//! ## Refinement
//!
//! Passes repeat until the embedding is valid or stops improving:
//! - a concurrent round of [`mutation`]s: preparer threads plan against
//!   read views, one thread re-validates and applies the best plans through
//!   the [`state::ChangeLog`]
//! - crater repairs ([`lmrp`]): a ball of target vertices is torn down and
//!   rebuilt, with disjoint craters repaired in parallel
//! - rip-up: chains still in conflict are removed and placed again
//!
//! # Example
//!
//! ```
//! use minor_embedding::graph::generators::{chimera, complete};
//! use minor_embedding::{EmbeddingConfig, EmbeddingSuite};
//!
//! let suite = EmbeddingSuite::new(complete(4), chimera(2, 2), EmbeddingConfig::default());
//! let embedding = suite.find_embedding().unwrap();
//! assert_eq!(embedding.mapping().len(), 4);
//! ```

pub mod config;
pub mod error;
pub mod flow;
pub mod graph;
pub mod lmrp;
pub mod mutation;
pub mod placer;
pub mod reducer;
pub mod state;
pub mod statistics;
pub mod suite;

// Re-export commonly used types
pub use config::EmbeddingConfig;
pub use error::{EmbeddingError, Result};
pub use graph::{AdjacencyList, Edge, Graph, Vertex};
pub use placer::{PlacementKind, SuperVertexPlacer};
pub use state::{Chain, EmbeddingManager, EmbeddingState, EmbeddingView, Mapping};
pub use statistics::{Counters, Statistics};
pub use suite::{Embedding, EmbeddingSuite};
