// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Edge-list import.
//!
//! An edge list is a JSON array of vertex pairs, e.g. `[[0,1],[1,2]]`.

use super::{Graph, Vertex};
use crate::error::Result;
use std::path::Path;

/// Parse a bracketed edge list such as `[[0,1],[1,2]]`.
///
/// # Errors
///
/// `Parse` on malformed JSON, trailing input, an entry that is not a pair
/// or a vertex id outside the `u32` range.
pub fn parse_edge_list(input: &[u8]) -> Result<Graph> {
    let edges: Vec<(Vertex, Vertex)> = serde_json::from_slice(input)?;
    Ok(edges.into_iter().collect())
}

/// Read and parse an edge list file.
///
/// # Errors
///
/// `Io` if the file cannot be read, `Parse` if its contents are malformed.
pub fn load_edge_list<P: AsRef<Path>>(path: P) -> Result<Graph> {
    let bytes = std::fs::read(path)?;
    parse_edge_list(&bytes)
}
