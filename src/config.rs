//! Search and driver configuration.

use std::time::Duration;

use fastrand::Rng;

use crate::actions::GeneratePolicy;
use crate::constants::{
    FLAT_SIMULATIONS, GC_VISIT_THRESHOLD, MAX_NODES, N_ITERATIONS, ROLLOUT_LIMIT, TIMEOUT_MS,
    UCB_C,
};

/// Parameters of the generic tree search.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Iteration ceiling.
    pub max_iteration: usize,
    /// Wall-clock budget, checked before every iteration.
    pub timeout: Duration,
    /// Arena capacity.
    pub max_nodes: usize,
    /// Collect lightly visited subtrees when the arena fills up.
    pub enable_gc: bool,
    /// Subtrees rooted at nodes with fewer visits are collectable.
    pub gc_visit_threshold: u32,
    /// Exploration constant of UCB1.
    pub ucb_c: f64,
    /// Rollouts longer than this are abandoned.
    pub rollout_limit: usize,
    /// Seed for rollouts and chance sampling; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_iteration: N_ITERATIONS,
            timeout: Duration::from_millis(TIMEOUT_MS),
            max_nodes: MAX_NODES,
            enable_gc: true,
            gc_visit_threshold: GC_VISIT_THRESHOLD,
            ucb_c: UCB_C,
            rollout_limit: ROLLOUT_LIMIT,
            seed: None,
        }
    }
}

impl SearchConfig {
    pub fn rng(&self) -> Rng {
        match self.seed {
            Some(seed) => Rng::with_seed(seed),
            None => Rng::new(),
        }
    }
}

/// How the driver picks an action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Monte Carlo tree search.
    #[default]
    Tree,
    /// Equal rollouts per root action, most wins picked.
    Flat,
}

/// Everything the decision driver needs.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub mode: SearchMode,
    pub policy: GeneratePolicy,
    /// Total rollout budget in [`SearchMode::Flat`].
    pub flat_simulations: usize,
    pub search: SearchConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            policy: GeneratePolicy::default(),
            flat_simulations: FLAT_SIMULATIONS,
            search: SearchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let config = SearchConfig {
            seed: Some(42),
            ..SearchConfig::default()
        };
        let mut a = config.rng();
        let mut b = config.rng();
        let xs: Vec<u32> = (0..8).map(|_| a.u32(..)).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.u32(..)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.mode, SearchMode::Tree);
        assert_eq!(config.policy, GeneratePolicy::Default);
        assert!(config.search.enable_gc);
    }
}
