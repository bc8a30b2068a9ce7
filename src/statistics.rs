// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Statistics
//!
//! Counters for one embedding run. Every stage increments them through a
//! shared reference, so they are atomics and may be bumped from preparer
//! threads.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{EnumCount as EnumCountMacro, EnumIter, IntoStaticStr};

#[derive(EnumCountMacro, EnumIter, IntoStaticStr, Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Counters {
    TrivialPlacements,
    SimplePlacements,
    ComplexPlacements,
    MutationsPrepared,
    MutationsPromising,
    MutationsExecuted,
    MutationsInvalidated,
    MutationsRequeued,
    MutationsDiscarded,
    Synchronizations,
    CratersRepaired,
    CraterClaimsRejected,
}

#[derive(Debug, Default)]
pub struct Statistics {
    stats: [AtomicU64; Counters::COUNT],
}

impl Statistics {
    pub fn new() -> Self {
        Statistics::default()
    }

    /// Increment the specified counter by 1.
    pub fn increment(&self, counter: Counters) {
        self.add(counter, 1);
    }

    /// Increment the specified counter by `amount`.
    pub fn add(&self, counter: Counters, amount: u64) {
        self.stats[counter as usize].fetch_add(amount, Ordering::Relaxed);
    }

    /// Get the current value of the specified counter.
    pub fn get(&self, counter: Counters) -> u64 {
        self.stats[counter as usize].load(Ordering::Relaxed)
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for counter in Counters::iter() {
            let value = self.get(counter);
            if value == 0 {
                continue;
            }
            if !first {
                write!(f, ", ")?;
            }
            let name: &'static str = counter.into();
            write!(f, "{}={}", name, value)?;
            first = false;
        }
        Ok(())
    }
}
