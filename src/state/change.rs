// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Buffered changes to the embedding state.
//!
//! Components that must not write the canonical state directly push
//! [`EmbeddingChange`] records onto a [`ChangeLog`]. A `Commit` record closes a
//! batch. Replay happens in FIFO order and only up to the last committed
//! batch: records pushed after the most recent `commit()` stay queued until a
//! later commit covers them.
//!
//! This is the write-ahead counterpart of a backtracking trail: instead of
//! remembering old values to undo, it remembers new values to apply.

use crate::graph::Vertex;
use crossbeam::queue::SegQueue;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A single buffered edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingChange {
    /// `source` gains `target` in its chain.
    InsertMappingPair { source: Vertex, target: Vertex },
    /// `source` loses `target` from its chain.
    DeleteMappingPair { source: Vertex, target: Vertex },
    /// Overwrite the free-neighbour counter of `source`.
    SetFreeNeighbors { source: Vertex, count: i64 },
    /// Mark `target` as occupied.
    OccupyNode { target: Vertex },
    /// Mark `target` as free, if no chain owns it when applied.
    FreeNode { target: Vertex },
    /// Batch boundary.
    Commit,
}

/// Concurrent FIFO of buffered changes with a pending-commit counter.
///
/// Any thread may push; only the owner of the canonical state drains.
#[derive(Debug, Default)]
pub struct ChangeLog {
    queue: SegQueue<EmbeddingChange>,
    pending_commits: AtomicUsize,
}

impl ChangeLog {
    /// Create an empty change log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change. `Commit` records should go through [`commit`](Self::commit).
    pub fn push(&self, change: EmbeddingChange) {
        if change == EmbeddingChange::Commit {
            self.commit();
        } else {
            self.queue.push(change);
        }
    }

    /// Close the current batch.
    pub fn commit(&self) {
        // Count before publishing the marker so a concurrent drain can never
        // consume a marker it has not counted.
        self.pending_commits.fetch_add(1, Ordering::AcqRel);
        self.queue.push(EmbeddingChange::Commit);
    }

    /// Number of commits not yet drained.
    pub fn pending_commits(&self) -> usize {
        self.pending_commits.load(Ordering::Acquire)
    }

    /// Number of queued records, commit markers included.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Replay committed changes into `apply`, oldest first.
    ///
    /// Stops once every commit outstanding at the time of the call has been
    /// consumed, or the queue runs dry. Returns the number of changes applied
    /// (commit markers excluded).
    pub fn drain<F>(&self, mut apply: F) -> usize
    where
        F: FnMut(EmbeddingChange),
    {
        let mut outstanding = self.pending_commits();
        let mut applied = 0;
        while outstanding > 0 {
            let Some(change) = self.queue.pop() else {
                break;
            };
            match change {
                EmbeddingChange::Commit => {
                    outstanding -= 1;
                    self.pending_commits.fetch_sub(1, Ordering::AcqRel);
                }
                change => {
                    apply(change);
                    applied += 1;
                }
            }
        }
        applied
    }
}
