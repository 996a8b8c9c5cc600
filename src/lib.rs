/*
Tachyon: an epoch-driven reinforcement-learning controller for cache
prefetching.

The controller sits between a host simulator's cache and a set of candidate
prefetch algorithms. At fixed epoch boundaries it observes coarse
performance signals (miss-rate and IPC deltas, a derived accuracy proxy),
encodes them into a small discrete state, and uses an ε-greedy bandit over a
persisted action-value table to decide which candidate (if any) may issue
prefetches until the next boundary. The cache, CPU, children, and event
scheduler are reached through the narrow interfaces in `prefetch::ports` and
`sim::event`.
*/

pub mod prefetch;
pub mod sim;
