// Copyright (C) 2025 Jeremy J. Carroll. See LICENSE for details.

//! Tunables for one embedding run.

/// Configuration shared by every stage of an embedding run.
///
/// The defaults are the values the heuristics were tuned with; tests usually
/// only change `seed` and `threads`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Seed for every random choice.
    pub seed: u64,

    /// Mutation preparer threads (0 = available parallelism).
    pub threads: usize,

    /// Refinement passes after the constructive phase.
    pub max_passes: usize,

    /// Reducer iteration budget as a multiple of its candidate pool size.
    pub reducer_iteration_factor: usize,

    /// Capacity of the frontier-shifting candidate cache.
    pub candidate_cache_capacity: usize,

    /// Flow arc cost for entering a free target vertex.
    pub free_cost: i64,

    /// Flow arc cost for entering a target vertex owned by an unrelated chain.
    pub occupied_cost: i64,

    /// Radius of the ball of target vertices torn down by one crater repair.
    pub crater_radius: usize,

    /// Times an invalidated mutation is re-prepared before being dropped.
    pub max_requeues: u32,

    /// Run a mutation round after every N constructive placements.
    pub construction_mutation_interval: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            threads: 0,
            max_passes: 64,
            reducer_iteration_factor: 8,
            candidate_cache_capacity: 1024,
            free_cost: 1,
            occupied_cost: 64,
            crater_radius: 2,
            max_requeues: 2,
            construction_mutation_interval: None,
        }
    }
}

impl EmbeddingConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the preparer thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Set the number of refinement passes.
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Set the reducer iteration factor.
    pub fn with_reducer_iteration_factor(mut self, factor: usize) -> Self {
        self.reducer_iteration_factor = factor;
        self
    }

    /// Set the candidate cache capacity.
    pub fn with_candidate_cache_capacity(mut self, capacity: usize) -> Self {
        self.candidate_cache_capacity = capacity;
        self
    }

    /// Set the flow arc costs for free and foreign-occupied target vertices.
    pub fn with_flow_costs(mut self, free_cost: i64, occupied_cost: i64) -> Self {
        self.free_cost = free_cost;
        self.occupied_cost = occupied_cost;
        self
    }

    /// Set the crater radius.
    pub fn with_crater_radius(mut self, radius: usize) -> Self {
        self.crater_radius = radius;
        self
    }

    /// Set how often an invalidated mutation may be re-prepared.
    pub fn with_max_requeues(mut self, max_requeues: u32) -> Self {
        self.max_requeues = max_requeues;
        self
    }

    /// Interleave mutation rounds with the constructive phase.
    pub fn with_construction_mutation_interval(mut self, interval: Option<usize>) -> Self {
        self.construction_mutation_interval = interval.filter(|n| *n > 0);
        self
    }

    /// Preparer thread count with 0 resolved to the available parallelism.
    pub fn resolved_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let config = EmbeddingConfig::new()
            .with_seed(9)
            .with_threads(3)
            .with_max_passes(5)
            .with_construction_mutation_interval(Some(0));
        assert_eq!(config.seed, 9);
        assert_eq!(config.resolved_threads(), 3);
        assert_eq!(config.max_passes, 5);
        assert_eq!(config.construction_mutation_interval, None);
        assert_eq!(config.reducer_iteration_factor, 8);
    }

    #[test]
    fn test_auto_threads_is_positive() {
        assert!(EmbeddingConfig::default().resolved_threads() >= 1);
    }
}
