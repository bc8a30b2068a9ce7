// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Standard graph topologies.
//!
//! Hardware targets (Chimera, King's graph) and the small logical graphs used
//! as fixtures (cliques, cycles, Petersen, random graphs).

use super::{Graph, Vertex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Qubits per shore of a Chimera unit cell.
pub const CHIMERA_SHORE: Vertex = 4;

/// Linear index of a Chimera qubit.
///
/// `(row, col)` selects the unit cell, `side` is 0 for the vertical shore and
/// 1 for the horizontal shore, `k` is the position within the shore.
pub fn chimera_index(cols: Vertex, row: Vertex, col: Vertex, side: Vertex, k: Vertex) -> Vertex {
    let cell = 2 * CHIMERA_SHORE;
    row * cols * cell + col * cell + side * CHIMERA_SHORE + k
}

/// A `rows x cols` Chimera graph with shore size 4.
///
/// Each unit cell is a complete bipartite K(4,4). Vertical-shore qubits couple
/// to the same qubit in the cell below; horizontal-shore qubits couple to the
/// same qubit in the cell to the right.
pub fn chimera(rows: Vertex, cols: Vertex) -> Graph {
    let mut graph = Graph::new();
    for row in 0..rows {
        for col in 0..cols {
            for a in 0..CHIMERA_SHORE {
                for b in 0..CHIMERA_SHORE {
                    graph.insert(
                        chimera_index(cols, row, col, 0, a),
                        chimera_index(cols, row, col, 1, b),
                    );
                }
            }
            for k in 0..CHIMERA_SHORE {
                if row + 1 < rows {
                    graph.insert(
                        chimera_index(cols, row, col, 0, k),
                        chimera_index(cols, row + 1, col, 0, k),
                    );
                }
                if col + 1 < cols {
                    graph.insert(
                        chimera_index(cols, row, col, 1, k),
                        chimera_index(cols, row, col + 1, 1, k),
                    );
                }
            }
        }
    }
    graph
}

/// A `rows x cols` King's graph: grid vertices joined to all eight
/// orthogonal and diagonal neighbours. Vertex `r * cols + c`.
pub fn king(rows: Vertex, cols: Vertex) -> Graph {
    let index = |r: Vertex, c: Vertex| r * cols + c;
    let mut graph = Graph::new();
    for r in 0..rows {
        for c in 0..cols {
            if c + 1 < cols {
                graph.insert(index(r, c), index(r, c + 1));
            }
            if r + 1 < rows {
                graph.insert(index(r, c), index(r + 1, c));
                if c + 1 < cols {
                    graph.insert(index(r, c), index(r + 1, c + 1));
                }
                if c > 0 {
                    graph.insert(index(r, c), index(r + 1, c - 1));
                }
            }
        }
    }
    graph
}

/// The complete graph on vertices `0..n`.
pub fn complete(n: Vertex) -> Graph {
    let mut graph = Graph::new();
    for a in 0..n {
        for b in (a + 1)..n {
            graph.insert(a, b);
        }
    }
    graph
}

/// The cycle `0 - 1 - ... - (n-1) - 0`. Requires `n >= 3`.
pub fn cycle(n: Vertex) -> Graph {
    let mut graph = Graph::new();
    for v in 0..n {
        graph.insert(v, (v + 1) % n);
    }
    graph
}

/// The Petersen graph: outer 5-cycle 0..5, inner pentagram 5..10, spokes.
pub fn petersen() -> Graph {
    let mut graph = Graph::new();
    for i in 0..5 {
        graph.insert(i, (i + 1) % 5);
        graph.insert(i, i + 5);
        graph.insert(i + 5, (i + 2) % 5 + 5);
    }
    graph
}

/// An Erdős-Rényi G(n, p) graph drawn from a seeded generator.
pub fn erdos_renyi(n: Vertex, p: f64, seed: u64) -> Graph {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut graph = Graph::new();
    for a in 0..n {
        for b in (a + 1)..n {
            if rng.gen_bool(p.clamp(0.0, 1.0)) {
                graph.insert(a, b);
            }
        }
    }
    graph
}
