use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub type Addr = u64;

// Prefetch candidate: block address plus the child-assigned priority.
pub type AddrPriority = (Addr, i32);

#[derive(Debug, Clone, Copy)]
pub struct AccessInfo {
    pub addr: Addr,
    pub pc: Addr,
    pub miss: bool,
}

impl AccessInfo {
    pub fn new(addr: Addr, pc: Addr, miss: bool) -> Self {
        Self { addr, pc, miss }
    }
}

// Cumulative counters exposed by the managed cache.
pub trait CacheView {
    fn runtime_accesses(&self) -> u64;
    fn runtime_misses(&self) -> u64;
}

// Retired-op counter exposed by the CPU driving the cache.
pub trait CpuView {
    fn total_ops(&self) -> u64;
}

/// A candidate prefetch algorithm managed by the controller.
///
/// `calculate_prefetch` is invoked for every prefetch query regardless of
/// which child is currently selected; children rely on the call stream to
/// keep their internal pattern tables warm. Candidates pushed into `out`
/// by non-selected children are discarded by the caller.
pub trait ChildPrefetcher {
    fn name(&self) -> &str;

    fn calculate_prefetch(
        &mut self,
        access: &AccessInfo,
        out: &mut Vec<AddrPriority>,
        cache: &dyn CacheView,
    );
}

pub type CacheHandle = Arc<RwLock<dyn CacheView>>;
pub type CpuHandle = Arc<RwLock<dyn CpuView>>;

// Name-to-object lookup the host populates before controller startup.
#[derive(Default)]
pub struct CacheRegistry {
    caches: HashMap<String, CacheHandle>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, cache: CacheHandle) {
        self.caches.insert(name.into(), cache);
    }

    pub fn resolve(&self, name: &str) -> Option<CacheHandle> {
        self.caches.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCache;

    impl CacheView for FixedCache {
        fn runtime_accesses(&self) -> u64 {
            7
        }
        fn runtime_misses(&self) -> u64 {
            3
        }
    }

    #[test]
    fn registry_resolves_registered_names_only() {
        let mut registry = CacheRegistry::new();
        let cache: CacheHandle = Arc::new(RwLock::new(FixedCache));
        registry.register("system.l2", cache);

        let found = registry.resolve("system.l2").expect("registered cache");
        assert_eq!(found.read().unwrap().runtime_accesses(), 7);
        assert!(registry.resolve("system.l3").is_none());
    }
}
