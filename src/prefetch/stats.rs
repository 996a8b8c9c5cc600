use std::path::Path;

use serde::Serialize;

/// Action-usage and per-child prefetch counters, sized to the child set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControllerStats {
    action_use: Vec<u64>,
    issued: Vec<u64>,
    useful: Vec<u64>,
    redundant: Vec<u64>,
}

impl ControllerStats {
    pub fn new(num_children: usize) -> Self {
        Self {
            action_use: vec![0; num_children + 1],
            issued: vec![0; num_children],
            useful: vec![0; num_children],
            redundant: vec![0; num_children],
        }
    }

    pub fn record_action(&mut self, bandit_index: usize) {
        if let Some(slot) = self.action_use.get_mut(bandit_index) {
            *slot = slot.saturating_add(1);
        }
    }

    pub fn record_issued(&mut self, child: usize) {
        if let Some(slot) = self.issued.get_mut(child) {
            *slot = slot.saturating_add(1);
        }
    }

    pub fn record_useful(&mut self, child: usize) {
        if let Some(slot) = self.useful.get_mut(child) {
            *slot = slot.saturating_add(1);
        }
    }

    pub fn record_redundant(&mut self, child: usize) {
        if let Some(slot) = self.redundant.get_mut(child) {
            *slot = slot.saturating_add(1);
        }
    }

    pub fn action_use(&self) -> &[u64] {
        &self.action_use
    }

    pub fn issued(&self) -> &[u64] {
        &self.issued
    }

    pub fn useful(&self) -> &[u64] {
        &self.useful
    }

    pub fn redundant(&self) -> &[u64] {
        &self.redundant
    }

    pub fn epochs_recorded(&self) -> u64 {
        self.action_use.iter().sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildPfSummary {
    pub name: String,
    pub issued: u64,
    pub useful: u64,
    pub redundant: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControllerSummary {
    pub name: String,
    pub epochs: u64,
    pub explore_rate: f64,
    pub qtable_states: usize,
    pub action_use: Vec<u64>,
    pub children: Vec<ChildPfSummary>,
}

pub fn write_summary(path: &Path, summary: &ControllerSummary) {
    if let Ok(payload) = serde_json::to_string_pretty(summary) {
        let _ = std::fs::write(path, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_sized_to_the_child_set() {
        let stats = ControllerStats::new(3);
        assert_eq!(stats.action_use().len(), 4);
        assert_eq!(stats.issued().len(), 3);
    }

    #[test]
    fn out_of_range_indices_are_ignored() {
        let mut stats = ControllerStats::new(1);
        stats.record_action(5);
        stats.record_issued(5);
        assert_eq!(stats.epochs_recorded(), 0);
        assert_eq!(stats.issued(), &[0]);
    }

    #[test]
    fn summary_serializes_to_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let summary = ControllerSummary {
            name: "ctrl".to_string(),
            epochs: 10,
            explore_rate: 0.05,
            qtable_states: 2,
            action_use: vec![4, 6],
            children: vec![ChildPfSummary {
                name: "stride".to_string(),
                issued: 3,
                useful: 1,
                redundant: 0,
            }],
        };

        write_summary(&path, &summary);
        let payload = std::fs::read_to_string(&path).unwrap();
        assert!(payload.contains("\"epochs\": 10"));
        assert!(payload.contains("\"stride\""));
    }
}
