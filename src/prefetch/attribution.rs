use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::sim::event::Tick;

use super::ports::Addr;

// Upper bound on tracked in-flight prefetches; the table is cleared
// wholesale rather than evicted entry-by-entry when it fills.
pub const MAX_TRACKED_PREFETCHES: usize = 2048;

#[derive(Debug, Clone, Copy)]
struct PrefetchMeta {
    child: usize,
    issued_at: Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    // First time this address was attributed.
    Issued,
    // Address was already tracked; the newest issuer takes over.
    Redundant,
}

/// Bounded map from prefetched block address to the child that issued it.
#[derive(Debug, Default)]
pub struct AttributionTable {
    entries: HashMap<Addr, PrefetchMeta>,
}

impl AttributionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn track_issued(&mut self, child: usize, addr: Addr, now: Tick) -> TrackOutcome {
        if self.entries.len() >= MAX_TRACKED_PREFETCHES {
            self.entries.clear();
        }

        let meta = PrefetchMeta {
            child,
            issued_at: now,
        };
        match self.entries.entry(addr) {
            Entry::Occupied(mut entry) => {
                entry.insert(meta);
                TrackOutcome::Redundant
            }
            Entry::Vacant(entry) => {
                entry.insert(meta);
                TrackOutcome::Issued
            }
        }
    }

    // Credit and drop the entry on a demand hit; at most one credit per
    // tracked prefetch.
    pub fn take_useful(&mut self, addr: Addr) -> Option<usize> {
        self.entries.remove(&addr).map(|meta| meta.child)
    }

    pub fn issuer_of(&self, addr: Addr) -> Option<usize> {
        self.entries.get(&addr).map(|meta| meta.child)
    }

    pub fn issued_tick_of(&self, addr: Addr) -> Option<Tick> {
        self.entries.get(&addr).map(|meta| meta.issued_at)
    }
}
