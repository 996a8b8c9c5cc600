/*
Epoch-driven bandit controller over a set of candidate prefetchers.

At every epoch boundary the controller reads cumulative access/miss counts
from the managed cache and retired-op counts from the CPU, turns the deltas
into a small discrete state, rewards the action taken over the elapsed
epoch, updates the tabular action values, and selects the child prefetcher
(or none) that may issue prefetches until the next boundary. Between
boundaries every cache access feeds the attribution table and every
prefetch query trains all children, while only the selected child's
candidates are emitted.
*/

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};

use crate::sim::csv_log::{self, CsvLog, EpochCsvRow};
use crate::sim::event::{EventQueue, Tick};

use super::attribution::{AttributionTable, TrackOutcome};
use super::config::ControllerConfig;
use super::persist::{self, LoadOutcome};
use super::policy::{Action, BanditPolicy, QTable};
use super::ports::{
    AccessInfo, AddrPriority, CacheHandle, CacheRegistry, CacheView, ChildPrefetcher, CpuHandle,
};
use super::stats::{ChildPfSummary, ControllerStats, ControllerSummary};

// Log a CSV row every this many epochs when debug logging is enabled.
const EPOCH_PRINT_INTERVAL: u64 = 20;

// Exponential smoothing factor for the per-epoch miss rate.
const MISS_SMOOTH_ALPHA: f64 = 0.3;

// Half-span of the smoothed-miss-rate improvement mapped onto [0,1].
const ACC_MAX_SPAN: f64 = 0.2;

// IPC deltas inside the dead-zone contribute no reward sign.
const IPC_SIGN_DEADZONE: f64 = 1e-6;

/// One-shot event the host scheduler delivers back to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    EpochUpdate,
}

/// Performance signals derived from one epoch's counter deltas.
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochObservation {
    pub raw_miss_rate: f64,
    pub smoothed_miss_rate: f64,
    pub delta_smoothed_miss: f64,
    pub ipc: f64,
    pub delta_ipc: f64,
    pub accuracy: f64,
}

pub struct PrefetchController {
    name: String,
    cache_name: String,
    cache: Option<CacheHandle>,
    cpu: Option<CpuHandle>,
    children: Vec<Box<dyn ChildPrefetcher>>,
    current_action: Action,
    num_actions: usize,
    epoch_ticks: Tick,

    // Cache counter snapshots for the real per-epoch miss rate.
    last_accesses: u64,
    last_misses: u64,

    // Notify-based counters; reset every epoch.
    epoch_accesses: u64,
    epoch_misses: u64,

    // Miss-rate history feeding state and accuracy.
    smoothed_miss_rate: f64,
    last_smoothed_miss: f64,
    have_smoothed_miss: bool,

    qtable: QTable,
    last_state: u64,
    // Bandit index of the action whose reward is still pending.
    last_action: usize,
    last_reward: f64,
    policy: BanditPolicy,
    action_penalties: Vec<f64>,
    debug_logging: bool,

    // IPC tracking for reward shaping.
    last_total_ops: u64,
    last_ipc: f64,
    last_ipc_tick: Tick,

    attribution: AttributionTable,
    stats: ControllerStats,
    epochs: u64,
    last_observation: EpochObservation,

    qtable_path: PathBuf,
    qtable_loaded: bool,
    csv: Option<Arc<CsvLog>>,
}

impl PrefetchController {
    pub fn new(
        config: &ControllerConfig,
        children: Vec<Box<dyn ChildPrefetcher>>,
        cpu: Option<CpuHandle>,
    ) -> Self {
        assert!(config.ticks_per_epoch > 0, "ticks_per_epoch must be > 0");

        let num_children = children.len();
        let num_actions = num_children + 1;

        let mut initial = config.current_action;
        if initial < -1 || initial >= num_children as i64 {
            warn!(
                "{}: initial action {} invalid, resetting to 0",
                config.name, initial
            );
            initial = 0;
        }
        let current_action = if initial < 0 {
            Action::Off
        } else {
            Action::Child(initial as usize)
        };

        let qtable_path = if config.qtable_file.is_empty() {
            persist::default_qtable_path(&config.cache_name, &config.name)
        } else {
            PathBuf::from(&config.qtable_file)
        };

        let csv = if config.debug_logging {
            csv_log::global()
        } else {
            None
        };

        Self {
            name: config.name.clone(),
            cache_name: config.cache_name.clone(),
            cache: None,
            cpu,
            children,
            current_action,
            num_actions,
            epoch_ticks: config.ticks_per_epoch,
            last_accesses: 0,
            last_misses: 0,
            epoch_accesses: 0,
            epoch_misses: 0,
            smoothed_miss_rate: 0.0,
            last_smoothed_miss: 0.0,
            have_smoothed_miss: false,
            qtable: QTable::new(),
            last_state: 0,
            last_action: 0,
            last_reward: 0.0,
            policy: BanditPolicy::new(
                num_actions,
                config.learning_rate,
                config.explore_rate,
                config.seed,
            ),
            action_penalties: normalise_penalties(&config.action_penalties, num_actions),
            debug_logging: config.debug_logging,
            last_total_ops: 0,
            last_ipc: 0.0,
            last_ipc_tick: 0,
            attribution: AttributionTable::new(),
            stats: ControllerStats::new(num_children),
            epochs: 0,
            last_observation: EpochObservation::default(),
            qtable_path,
            qtable_loaded: false,
            csv,
        }
    }

    /// Load any persisted table, resolve the managed cache, snapshot the
    /// collaborator counters, and schedule the first epoch boundary.
    pub fn startup(
        &mut self,
        now: Tick,
        caches: &CacheRegistry,
        events: &mut EventQueue<ControllerEvent>,
    ) {
        self.load_qtable();

        if self.cache_name.is_empty() {
            warn!("{}: cache_name not set; miss-based state disabled", self.name);
        } else {
            match caches.resolve(&self.cache_name) {
                Some(cache) => {
                    {
                        let view = cache.read().expect("cache lock poisoned");
                        self.last_accesses = view.runtime_accesses();
                        self.last_misses = view.runtime_misses();
                    }
                    self.cache = Some(cache);
                }
                None => warn!(
                    "{}: cache '{}' not found; miss-based state disabled",
                    self.name, self.cache_name
                ),
            }
        }

        if let Some(cpu) = &self.cpu {
            self.last_total_ops = cpu.read().expect("cpu lock poisoned").total_ops();
        } else {
            warn!("{}: no CPU attached; IPC reward disabled", self.name);
        }
        self.last_ipc_tick = now;

        events.schedule(now + self.epoch_ticks, ControllerEvent::EpochUpdate);
    }

    /// Observe one cache access between epoch boundaries.
    pub fn notify(&mut self, access: &AccessInfo) {
        self.epoch_accesses += 1;
        if access.miss {
            self.epoch_misses += 1;
        } else if let Some(child) = self.attribution.take_useful(access.addr) {
            self.stats.record_useful(child);
        }

        // Children are deliberately not notified here; they are trained
        // solely through the calculate_prefetch fan-out, and forwarding
        // the notification as well would train them twice per access.
    }

    /// Fan a prefetch query out to every child so each keeps learning, but
    /// emit and attribute candidates only from the currently selected one.
    pub fn calculate_prefetch(
        &mut self,
        now: Tick,
        access: &AccessInfo,
        candidates: &mut Vec<AddrPriority>,
        cache: &dyn CacheView,
    ) {
        let active = self.current_action.child_index();

        let mut scratch = Vec::new();
        for (index, child) in self.children.iter_mut().enumerate() {
            scratch.clear();
            child.calculate_prefetch(access, &mut scratch, cache);
            debug!(
                "{}: child {} generated {} candidates",
                self.name,
                index,
                scratch.len()
            );

            if Some(index) != active {
                continue;
            }
            for &(addr, priority) in &scratch {
                candidates.push((addr, priority));
                match self.attribution.track_issued(index, addr, now) {
                    TrackOutcome::Issued => self.stats.record_issued(index),
                    TrackOutcome::Redundant => self.stats.record_redundant(index),
                }
            }
        }
    }

    /// Epoch boundary: close out the elapsed epoch, persist the table, and
    /// re-schedule exactly one follow-up event.
    pub fn update_model(&mut self, now: Tick, events: &mut EventQueue<ControllerEvent>) {
        self.end_epoch(now);
        self.save_qtable();
        events.schedule(now + self.epoch_ticks, ControllerEvent::EpochUpdate);
    }

    fn end_epoch(&mut self, now: Tick) {
        // 1. Real miss rate from cache counter deltas.
        let mut miss_rate = 0.0;
        if let Some(cache) = &self.cache {
            let (accesses, misses) = {
                let view = cache.read().expect("cache lock poisoned");
                (view.runtime_accesses(), view.runtime_misses())
            };
            let d_acc = accesses.saturating_sub(self.last_accesses);
            let d_mis = misses.saturating_sub(self.last_misses);
            self.last_accesses = accesses;
            self.last_misses = misses;
            if d_acc > 0 {
                miss_rate = d_mis as f64 / d_acc as f64;
            }
        }

        // 2. IPC and its delta. A zero-length window carries the previous
        // IPC over unchanged.
        let mut new_ipc = self.last_ipc;
        let mut ipc_delta = 0.0;
        if let Some(cpu) = &self.cpu {
            let ops = cpu.read().expect("cpu lock poisoned").total_ops();
            let dt = now.saturating_sub(self.last_ipc_tick);
            if dt > 0 {
                new_ipc = ops.saturating_sub(self.last_total_ops) as f64 / dt as f64;
                ipc_delta = new_ipc - self.last_ipc;
            }
            self.last_total_ops = ops;
            self.last_ipc_tick = now;
        }

        // 3. Smoothed miss rate; the first epoch seeds the filter.
        let delta_smoothed;
        if !self.have_smoothed_miss {
            self.smoothed_miss_rate = miss_rate;
            self.last_smoothed_miss = miss_rate;
            self.have_smoothed_miss = true;
            delta_smoothed = 0.0;
        } else {
            self.last_smoothed_miss = self.smoothed_miss_rate;
            self.smoothed_miss_rate =
                MISS_SMOOTH_ALPHA * miss_rate + (1.0 - MISS_SMOOTH_ALPHA) * self.smoothed_miss_rate;
            delta_smoothed = self.smoothed_miss_rate - self.last_smoothed_miss;
        }

        // 4. Accuracy: clamped improvement of the smoothed miss rate,
        // mapped linearly onto [0,1].
        let improvement = (self.last_smoothed_miss - self.smoothed_miss_rate)
            .clamp(-ACC_MAX_SPAN, ACC_MAX_SPAN);
        let accuracy = (improvement + ACC_MAX_SPAN) / (2.0 * ACC_MAX_SPAN);

        self.last_ipc = new_ipc;

        // 5. Discrete state.
        let state = encode_accuracy(accuracy) * 100
            + encode_delta_miss(delta_smoothed) * 10
            + encode_delta_ipc(ipc_delta);

        // 6. Shaped reward for the action taken over the elapsed epoch.
        let ipc_sign = if ipc_delta > IPC_SIGN_DEADZONE {
            1.0
        } else if ipc_delta < -IPC_SIGN_DEADZONE {
            -1.0
        } else {
            0.0
        };
        let acc_centered = 2.0 * accuracy - 1.0;
        let mut reward = 0.5 * ipc_sign + 0.5 * acc_centered;
        if let Some(penalty) = self.action_penalties.get(self.last_action) {
            reward -= penalty;
        }
        self.last_reward = reward;

        // 7. Move the previous (state, action) cell toward the reward.
        self.policy
            .update(&mut self.qtable, self.last_state, self.last_action, reward);

        // 8. Select the next action.
        let next_bandit = self.policy.select(&mut self.qtable, state);
        let next_action = Action::from_bandit(next_bandit, self.num_actions);

        // 9, 10. Usage counters and exploration decay.
        self.stats.record_action(next_bandit);
        self.policy.decay_explore();

        self.epochs += 1;
        self.last_observation = EpochObservation {
            raw_miss_rate: miss_rate,
            smoothed_miss_rate: self.smoothed_miss_rate,
            delta_smoothed_miss: delta_smoothed,
            ipc: new_ipc,
            delta_ipc: ipc_delta,
            accuracy,
        };

        // 11. Periodic CSV row.
        if self.debug_logging && self.epochs % EPOCH_PRINT_INTERVAL == 0 {
            if let Some(csv) = &self.csv {
                csv.write_row(&EpochCsvRow {
                    epoch: self.epochs,
                    tick: now,
                    state,
                    miss_rate,
                    delta_miss: delta_smoothed,
                    ipc: new_ipc,
                    delta_ipc: ipc_delta,
                    accuracy,
                    action: next_action.to_semantic(),
                });
            }
        }

        // 12. Commit and reset the per-epoch counters.
        self.current_action = next_action;
        self.last_state = state;
        self.last_action = next_bandit;
        self.epoch_accesses = 0;
        self.epoch_misses = 0;
    }

    fn load_qtable(&mut self) {
        let signature = persist::children_signature(&self.children);
        match persist::load_qtable(&self.qtable_path, &signature) {
            LoadOutcome::Loaded(table) => {
                info!(
                    "{}: loaded Q-table from {} ({} states)",
                    self.name,
                    self.qtable_path.display(),
                    table.len()
                );
                self.qtable = table;
                self.qtable_loaded = true;
            }
            LoadOutcome::Missing => warn!(
                "{}: no saved Q-table ({})",
                self.name,
                self.qtable_path.display()
            ),
            LoadOutcome::SignatureMismatch { saved } => warn!(
                "{}: Q-table signature mismatch; saved children '{}', current children '{}'; \
                 ignoring {}",
                self.name,
                saved,
                signature,
                self.qtable_path.display()
            ),
            LoadOutcome::Malformed { field } => warn!(
                "{}: failed to read {} from {}; ignoring saved Q-table",
                self.name,
                field,
                self.qtable_path.display()
            ),
        }
    }

    fn save_qtable(&self) {
        let signature = persist::children_signature(&self.children);
        match persist::save_qtable(&self.qtable_path, &signature, &self.qtable) {
            Ok(()) => debug!(
                "{}: Q-table saved ({}, {} states)",
                self.name,
                self.qtable_path.display(),
                self.qtable.len()
            ),
            Err(err) => warn!(
                "{}: could not save Q-table to {}: {}",
                self.name,
                self.qtable_path.display(),
                err
            ),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_action(&self) -> Action {
        self.current_action
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn explore_rate(&self) -> f64 {
        self.policy.explore_rate()
    }

    pub fn epochs(&self) -> u64 {
        self.epochs
    }

    pub fn qtable(&self) -> &QTable {
        &self.qtable
    }

    pub fn qtable_loaded(&self) -> bool {
        self.qtable_loaded
    }

    pub fn stats(&self) -> &ControllerStats {
        &self.stats
    }

    pub fn last_observation(&self) -> &EpochObservation {
        &self.last_observation
    }

    pub fn last_reward(&self) -> f64 {
        self.last_reward
    }

    pub fn tracked_prefetches(&self) -> usize {
        self.attribution.len()
    }

    pub fn summary(&self) -> ControllerSummary {
        ControllerSummary {
            name: self.name.clone(),
            epochs: self.epochs,
            explore_rate: self.policy.explore_rate(),
            qtable_states: self.qtable.len(),
            action_use: self.stats.action_use().to_vec(),
            children: self
                .children
                .iter()
                .enumerate()
                .map(|(index, child)| ChildPfSummary {
                    name: child.name().to_string(),
                    issued: self.stats.issued()[index],
                    useful: self.stats.useful()[index],
                    redundant: self.stats.redundant()[index],
                })
                .collect(),
        }
    }

    // Packed state the pending reward refers to.
    pub fn last_state(&self) -> u64 {
        self.last_state
    }

    // Notify-based (accesses, misses) seen so far this epoch.
    pub fn epoch_counters(&self) -> (u64, u64) {
        (self.epoch_accesses, self.epoch_misses)
    }
}

fn default_penalties(num_actions: usize) -> Vec<f64> {
    let mut penalties = vec![0.0; num_actions];
    let num_children = num_actions - 1;
    if num_children >= 2 {
        penalties[1] = 0.02;
    }
    if num_children >= 3 {
        penalties[2] = 0.03;
    }
    penalties
}

// The OFF slot never carries a penalty, whatever was configured.
pub(crate) fn normalise_penalties(configured: &[f64], num_actions: usize) -> Vec<f64> {
    if configured.is_empty() {
        return default_penalties(num_actions);
    }
    let mut penalties = configured.to_vec();
    penalties.resize(num_actions, 0.0);
    if let Some(off) = penalties.last_mut() {
        *off = 0.0;
    }
    penalties
}

fn encode_delta_miss(d: f64) -> u64 {
    if d < -0.10 {
        0
    } else if d < -0.02 {
        1
    } else if d < 0.02 {
        2
    } else if d < 0.10 {
        3
    } else {
        4
    }
}

fn encode_delta_ipc(d: f64) -> u64 {
    if d < -1e-4 {
        0
    } else if d < 1e-4 {
        1
    } else {
        2
    }
}

fn encode_accuracy(a: f64) -> u64 {
    if a <= 0.20 {
        0
    } else if a <= 0.60 {
        1
    } else {
        2
    }
}
