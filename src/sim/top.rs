use crate::prefetch::controller::{ControllerEvent, PrefetchController};
use crate::prefetch::ports::CacheRegistry;
use crate::sim::config::TopConfig;
use crate::sim::event::{EventQueue, Tick};

/// Minimal host wiring: one controller driven by a one-shot event queue.
///
/// Real embeddings own the scheduler themselves; this harness exists so the
/// epoch machinery can be exercised end to end.
pub struct SimTop {
    pub config: TopConfig,
    pub controller: PrefetchController,
    pub events: EventQueue<ControllerEvent>,
    pub now: Tick,
}

impl SimTop {
    pub fn new(config: TopConfig, controller: PrefetchController) -> Self {
        Self {
            config,
            controller,
            events: EventQueue::new(),
            now: 0,
        }
    }

    pub fn startup(&mut self, caches: &CacheRegistry) {
        let now = self.now;
        self.controller.startup(now, caches, &mut self.events);
    }

    // Deliver every event due at or before `limit`, in order.
    pub fn run_until(&mut self, limit: Tick) {
        while let Some((at, event)) = self.events.pop_due(limit) {
            self.now = at;
            match event {
                ControllerEvent::EpochUpdate => {
                    self.controller.update_model(at, &mut self.events);
                }
            }
        }
        self.now = limit;
    }

    pub fn run(&mut self) {
        let limit = self.config.timeout;
        self.run_until(limit);
    }
}
