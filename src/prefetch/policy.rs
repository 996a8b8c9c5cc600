use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const EXPLORE_MIN: f64 = 0.01;
pub const EXPLORE_DECAY: f64 = 0.9995;

/// Semantic action: suppress prefetching, or route to one child.
///
/// The bandit index space has one extra slot at the end for OFF; the
/// conversion happens only at this boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Off,
    Child(usize),
}

impl Action {
    pub fn from_bandit(index: usize, num_actions: usize) -> Action {
        if index + 1 == num_actions {
            Action::Off
        } else {
            Action::Child(index)
        }
    }

    pub fn child_index(self) -> Option<usize> {
        match self {
            Action::Off => None,
            Action::Child(index) => Some(index),
        }
    }

    // Integer form used at the configuration boundary and in the CSV log.
    pub fn to_semantic(self) -> i64 {
        match self {
            Action::Off => -1,
            Action::Child(index) => index as i64,
        }
    }
}

/// Sparse tabular action values, keyed by packed state.
///
/// Rows are created lazily and widened to the full action count on first
/// touch; the BTreeMap keeps iteration sorted by state so persisted files
/// diff reproducibly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    rows: BTreeMap<u64, Vec<f64>>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_mut(&mut self, state: u64, width: usize) -> &mut Vec<f64> {
        let row = self.rows.entry(state).or_default();
        if row.len() < width {
            row.resize(width, 0.0);
        }
        row
    }

    pub fn row(&self, state: u64) -> Option<&[f64]> {
        self.rows.get(&state).map(Vec::as_slice)
    }

    // Used by the persistence loader; rows keep their stored width until
    // first touched through `row_mut`.
    pub fn insert_row(&mut self, state: u64, row: Vec<f64>) {
        self.rows.insert(state, row);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &Vec<f64>)> {
        self.rows.iter()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// ε-greedy selection with a decaying exploration rate over a `QTable`.
#[derive(Debug)]
pub struct BanditPolicy {
    num_actions: usize,
    learning_rate: f64,
    explore_rate: f64,
    rng: StdRng,
}

impl BanditPolicy {
    pub fn new(num_actions: usize, learning_rate: f64, explore_rate: f64, seed: u64) -> Self {
        Self {
            num_actions: num_actions.max(1),
            learning_rate,
            explore_rate,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn explore_rate(&self) -> f64 {
        self.explore_rate
    }

    // Bandit index in [0, num_actions). Ties break toward the lowest index.
    pub fn select(&mut self, table: &mut QTable, state: u64) -> usize {
        let row = table.row_mut(state, self.num_actions);

        if self.rng.gen::<f64>() < self.explore_rate {
            return self.rng.gen_range(0..self.num_actions);
        }

        let mut best_index = 0;
        let mut best_value = row[0];
        for (index, &value) in row.iter().enumerate().skip(1) {
            if value > best_value {
                best_value = value;
                best_index = index;
            }
        }
        best_index
    }

    // Incremental mean of the observed reward for one (state, action) cell.
    pub fn update(&self, table: &mut QTable, state: u64, action: usize, reward: f64) {
        let row = table.row_mut(state, self.num_actions);
        if let Some(value) = row.get_mut(action) {
            *value += self.learning_rate * (reward - *value);
        }
    }

    pub fn decay_explore(&mut self) {
        self.explore_rate = EXPLORE_MIN.max(self.explore_rate * EXPLORE_DECAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_selection_returns_argmax() {
        let mut table = QTable::new();
        *table.row_mut(111, 3) = vec![0.1, 0.3, 0.2];

        let mut policy = BanditPolicy::new(3, 0.1, 0.0, 0);
        assert_eq!(policy.select(&mut table, 111), 1);
        assert_eq!(Action::from_bandit(1, 3), Action::Child(1));
    }

    #[test]
    fn ties_break_toward_the_lowest_index() {
        let mut table = QTable::new();
        *table.row_mut(42, 3) = vec![0.5, 0.5, 0.2];

        let mut policy = BanditPolicy::new(3, 0.1, 0.0, 0);
        assert_eq!(policy.select(&mut table, 42), 0);
    }

    #[test]
    fn selection_widens_missing_rows() {
        let mut table = QTable::new();
        let mut policy = BanditPolicy::new(4, 0.1, 0.0, 0);

        let index = policy.select(&mut table, 7);
        assert_eq!(index, 0);
        assert_eq!(table.row(7).unwrap().len(), 4);
    }

    #[test]
    fn exploration_stays_inside_the_action_space() {
        let mut table = QTable::new();
        let mut policy = BanditPolicy::new(3, 0.1, 1.0, 1234);
        for _ in 0..200 {
            let index = policy.select(&mut table, 0);
            assert!(index < 3);
        }
    }

    #[test]
    fn update_moves_the_cell_toward_the_reward() {
        let mut table = QTable::new();
        let policy = BanditPolicy::new(2, 0.1, 0.0, 0);

        policy.update(&mut table, 5, 0, 1.0);
        let first = table.row(5).unwrap()[0];
        assert!((first - 0.1).abs() < 1e-12);

        policy.update(&mut table, 5, 0, 1.0);
        let second = table.row(5).unwrap()[0];
        assert!((second - 0.19).abs() < 1e-12);
    }

    #[test]
    fn explore_decay_is_monotonic_and_floored() {
        let mut policy = BanditPolicy::new(2, 0.1, 0.5, 0);
        let mut previous = policy.explore_rate();
        for _ in 0..20_000 {
            policy.decay_explore();
            let current = policy.explore_rate();
            assert!(current <= previous);
            assert!(current >= EXPLORE_MIN);
            previous = current;
        }
        assert_eq!(policy.explore_rate(), EXPLORE_MIN);
    }

    #[test]
    fn off_maps_to_the_last_bandit_index() {
        assert_eq!(Action::from_bandit(2, 3), Action::Off);
        assert_eq!(Action::from_bandit(0, 1), Action::Off);
        assert_eq!(Action::Off.to_semantic(), -1);
        assert_eq!(Action::Child(2).to_semantic(), 2);
    }
}
