use serde::Deserialize;

use crate::sim::config::Config;
use crate::sim::event::Tick;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ControllerConfig {
    // Instance name; also the persistence-filename fallback when
    // `cache_name` is empty.
    pub name: String,
    pub cache_name: String,
    // Initial semantic action: -1 is OFF, otherwise a child index.
    pub current_action: i64,
    pub ticks_per_epoch: Tick,
    pub learning_rate: f64,
    pub explore_rate: f64,
    pub debug_logging: bool,
    // Overrides the derived `qtable_<name>.bin` path when non-empty.
    pub qtable_file: String,
    // Per-bandit-index reward penalties; empty selects the built-in
    // schedule. Normalised to K+1 entries with the OFF slot forced to 0.
    pub action_penalties: Vec<f64>,
    pub seed: u64,
}

impl Config for ControllerConfig {}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: "prefetch_controller".to_string(),
            cache_name: String::new(),
            current_action: 0,
            ticks_per_epoch: 1_000_000,
            learning_rate: 0.2,
            explore_rate: 0.05,
            debug_logging: false,
            qtable_file: String::new(),
            action_penalties: Vec::new(),
            seed: 0,
        }
    }
}
