// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Gate between concurrent preparers and the synchronizing thread.
//!
//! Preparers [`enter`](PrepareBarrier::enter) before taking a view and leave
//! when the returned guard drops. The incorporator
//! [`drain`s](PrepareBarrier::drain) the gate before it synchronizes: no new
//! preparer gets in, and the call returns once the running ones are out.
//! [`open`](PrepareBarrier::open) lets preparers in again.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Gate {
    running: usize,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct PrepareBarrier {
    gate: Mutex<Gate>,
    changed: Condvar,
}

/// A preparer inside the barrier.
#[derive(Debug)]
pub struct PrepareGuard<'a> {
    barrier: &'a PrepareBarrier,
}

impl PrepareBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the gate is open and register as running.
    pub fn enter(&self) -> PrepareGuard<'_> {
        let mut gate = self.gate.lock();
        while gate.closed {
            self.changed.wait(&mut gate);
        }
        gate.running += 1;
        PrepareGuard { barrier: self }
    }

    /// Close the gate and wait for every running preparer to leave.
    pub fn drain(&self) {
        let mut gate = self.gate.lock();
        gate.closed = true;
        while gate.running > 0 {
            self.changed.wait(&mut gate);
        }
    }

    /// Reopen the gate.
    pub fn open(&self) {
        self.gate.lock().closed = false;
        self.changed.notify_all();
    }

    /// Preparers currently inside.
    pub fn running(&self) -> usize {
        self.gate.lock().running
    }
}

impl Drop for PrepareGuard<'_> {
    fn drop(&mut self) {
        let mut gate = self.barrier.gate.lock();
        gate.running -= 1;
        if gate.running == 0 {
            self.barrier.changed.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn test_guard_counts_running() {
        let barrier = PrepareBarrier::new();
        let a = barrier.enter();
        let b = barrier.enter();
        assert_eq!(barrier.running(), 2);
        drop(a);
        drop(b);
        assert_eq!(barrier.running(), 0);
        barrier.drain();
        barrier.open();
        let _c = barrier.enter();
        assert_eq!(barrier.running(), 1);
    }

    #[test]
    fn test_drain_waits_for_running_preparer() {
        let barrier = PrepareBarrier::new();
        let finished = AtomicBool::new(false);
        std::thread::scope(|s| {
            let guard = barrier.enter();
            s.spawn(|| {
                let _guard = guard;
                std::thread::sleep(Duration::from_millis(20));
                finished.store(true, Ordering::SeqCst);
            });
            barrier.drain();
            assert!(finished.load(Ordering::SeqCst));
            barrier.open();
        });
    }

    #[test]
    fn test_closed_gate_blocks_until_open() {
        let barrier = PrepareBarrier::new();
        let entered = AtomicBool::new(false);
        barrier.drain();
        std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = barrier.enter();
                entered.store(true, Ordering::SeqCst);
            });
            std::thread::sleep(Duration::from_millis(20));
            assert!(!entered.load(Ordering::SeqCst));
            barrier.open();
        });
        assert!(entered.load(Ordering::SeqCst));
    }
}
