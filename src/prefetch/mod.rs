pub mod attribution;
pub mod config;
pub mod controller;
pub mod persist;
pub mod policy;
pub mod ports;
pub mod stats;


pub use attribution::{AttributionTable, TrackOutcome, MAX_TRACKED_PREFETCHES};
pub use config::ControllerConfig;
pub use controller::{ControllerEvent, EpochObservation, PrefetchController};
pub use persist::{children_signature, default_qtable_path, load_qtable, save_qtable, LoadOutcome};
pub use policy::{Action, BanditPolicy, QTable, EXPLORE_DECAY, EXPLORE_MIN};
pub use ports::{
    AccessInfo, Addr, AddrPriority, CacheHandle, CacheRegistry, CacheView, ChildPrefetcher,
    CpuHandle, CpuView,
};
pub use stats::{write_summary, ChildPfSummary, ControllerStats, ControllerSummary};
