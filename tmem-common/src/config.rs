//! # Compile-Time Defaults & Runtime Configuration
//!
//! Published defaults for every tunable the store, backends, and request
//! plane read. These mirror the constants baked into the original kernel
//! module (`TMEM_POOL_SIZE`, `PAGE_SIZE`, `SLEEP`) but are exposed as `const`
//! items and an overridable `TmemConfig` rather than compile-time `#define`s.

use std::time::Duration;

/// Size of a single cached page. Every stored value is truncated to this
/// many bytes; `GET` never returns more.
pub const PAGE_BYTES: usize = 4096;

/// Default capacity ceiling for the Local backend's `Store`.
pub const POOL_BYTES: u64 = 64 * 1024 * 1024;

/// Capacity ceiling used by the Pointer backend, which aliases caller
/// buffers instead of copying and so can afford a larger pool.
pub const POINTER_POOL_BYTES: u64 = 1024 * 1024 * 1024;

/// Largest key accepted anywhere in the system. Not specified numerically
/// upstream; chosen as a practical bound for a page-cache key rather
/// than an arbitrary string key.
pub const KEY_MAX: usize = 256;

/// Minimum and default size of a request-plane handle's scratch buffer.
pub const TMEM_MAX: usize = PAGE_BYTES;

/// Base delay applied by the `SLEEPY` mode bit and the Sleep backend.
pub const SLEEP_USECS: u64 = 10_000;

/// Jitter band around `SLEEP_USECS`.
pub const SLEEP_SLACK_USECS: u64 = 2_000;

/// Runtime-overridable configuration for a tmem deployment.
///
/// Every field defaults to the published constants above; callers embedding
/// the crate (tests, benchmarks, alternative backends) can override
/// individual fields without touching the compile-time defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TmemConfig {
    pub page_bytes: usize,
    pub pool_bytes: u64,
    pub key_max: usize,
    pub tmem_max: usize,
    pub sleep_usecs: u64,
    pub sleep_slack_usecs: u64,
    pub shard_count: usize,
}

impl Default for TmemConfig {
    fn default() -> Self {
        TmemConfig {
            page_bytes: PAGE_BYTES,
            pool_bytes: POOL_BYTES,
            key_max: KEY_MAX,
            tmem_max: TMEM_MAX,
            sleep_usecs: SLEEP_USECS,
            sleep_slack_usecs: SLEEP_SLACK_USECS,
            shard_count: default_shard_count(),
        }
    }
}

impl TmemConfig {
    /// A config matching the Pointer backend's larger default pool.
    pub fn for_pointer_backend() -> Self {
        TmemConfig {
            pool_bytes: POINTER_POOL_BYTES,
            ..TmemConfig::default()
        }
    }

    /// The `SLEEPY` delay as a jittered `Duration`, matching the original's
    /// `usleep_range(SLEEP_USECS - SLACK, SLEEP_USECS + SLACK)` window by
    /// using its midpoint (no RNG dependency for a fixed sleep duration).
    pub fn sleepy_delay(&self) -> Duration {
        Duration::from_micros(self.sleep_usecs)
    }
}

/// Shard count defaults to a power of two scaled off available parallelism,
/// degenerating to a single shard (the correctness floor: one lock for the
/// whole store) when parallelism can't be queried.
fn default_shard_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| (n.get() * 4).next_power_of_two())
        .unwrap_or(1)
}
