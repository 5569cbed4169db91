//! # Store
//!
//! The concurrent key/value index backing the Local backend. Sharded over
//! `parking_lot::Mutex`-guarded buckets (grounded on the same
//! shard-per-lock layout used elsewhere in this workspace for an in-memory
//! index, simplified here to drop LRU bookkeeping and TTLs — this store's
//! only eviction policy is refusing admission once full).
//!
//! ## Capacity accounting
//!
//! `current_bytes` always equals `PAGE_BYTES * entry_count`: every stored
//! value is truncated to at most `PAGE_BYTES` on the way in, so the store
//! accounts for page-sized slots rather than the caller's raw value length.
//! An update to an existing key never changes the entry count and so can
//! never trip the ceiling; only a brand-new key can be refused.
//!
//! ## Transactional insert
//!
//! The source driver's insert path could leak a partially built entry if an
//! allocation failed partway through (e.g. the key buffer allocated, then
//! the value buffer's allocation fails). `Store::put` builds the complete
//! owned key and value before ever touching the index, so there is no
//! partial state to roll back: either both allocations succeed and the
//! entry is linked in, or one fails and nothing has been mutated.

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::Mutex;
use tmem_common::{TmemConfig, PAGE_BYTES};

use crate::fingerprint::fingerprint;

/// Outcome of a successful or refused `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    Updated,
    CapacityExhausted,
}

struct Entry {
    value: Vec<u8>,
}

struct Shard {
    map: Mutex<HashMap<Vec<u8>, Entry, RandomState>>,
}

impl Shard {
    fn new() -> Self {
        Shard { map: Mutex::new(HashMap::with_hasher(RandomState::new())) }
    }
}

/// A sharded, capacity-bounded key/value store.
pub struct Store {
    shards: Vec<Shard>,
    shard_mask: usize,
    page_bytes: usize,
    pool_bytes: u64,
    current_bytes: AtomicU64,
}

impl Store {
    /// Builds a store using the published defaults.
    pub fn new() -> Self {
        Store::with_config(TmemConfig::default())
    }

    /// Builds a store from an explicit configuration (used by the Pointer
    /// backend's larger pool, and by tests exercising small ceilings).
    pub fn with_config(config: TmemConfig) -> Self {
        let shard_count = config.shard_count.max(1).next_power_of_two();
        let shards = (0..shard_count).map(|_| Shard::new()).collect();
        Store {
            shards,
            shard_mask: shard_count - 1,
            page_bytes: config.page_bytes,
            pool_bytes: config.pool_bytes,
            current_bytes: AtomicU64::new(0),
        }
    }

    fn shard_for(&self, hash: u64) -> &Shard {
        &self.shards[(hash as usize) & self.shard_mask]
    }

    /// Total bytes currently accounted for, always `PAGE_BYTES * len()`.
    pub fn current_bytes(&self) -> u64 {
        self.current_bytes.load(Ordering::SeqCst)
    }

    /// Number of entries across all shards. O(shard count).
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.map.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts or updates `key` with `value`, truncating the stored copy to
    /// `PAGE_BYTES`. Returns `CapacityExhausted` without modifying anything
    /// if this would be a new entry and the pool is full.
    pub fn put(&self, key: &[u8], value: &[u8]) -> PutOutcome {
        let fp = fingerprint(key);
        let truncated_len = value.len().min(self.page_bytes);
        let owned_value = value[..truncated_len].to_vec();
        let owned_key = fp.key().to_vec();

        let shard = self.shard_for(fp.hash());
        let mut map = shard.map.lock();

        if let Some(entry) = map.get_mut(&owned_key) {
            entry.value = owned_value;
            return PutOutcome::Updated;
        }

        let would_be_bytes = self.current_bytes.load(Ordering::SeqCst) + self.page_bytes as u64;
        if would_be_bytes > self.pool_bytes {
            tracing::warn!(pool_bytes = self.pool_bytes, current_bytes = would_be_bytes - self.page_bytes as u64, "admission refused, pool at capacity");
            return PutOutcome::CapacityExhausted;
        }

        map.insert(owned_key, Entry { value: owned_value });
        self.current_bytes.fetch_add(self.page_bytes as u64, Ordering::SeqCst);
        PutOutcome::Inserted
    }

    /// Looks up `key`, returning the stored bytes and their length, or
    /// `None` if absent. Equality is always exact-length, full-byte
    /// comparison — this is what prevents `"a"` from matching a stored
    /// `"aa"`.
    pub fn get(&self, key: &[u8]) -> Option<(Vec<u8>, usize)> {
        let fp = fingerprint(key);
        let shard = self.shard_for(fp.hash());
        let map = shard.map.lock();
        map.get(fp.key()).map(|entry| {
            let len = entry.value.len();
            (entry.value.clone(), len)
        })
    }

    /// Removes `key` if present. Idempotent: invalidating an absent key is
    /// a no-op, not an error.
    pub fn invalidate(&self, key: &[u8]) {
        let fp = fingerprint(key);
        let shard = self.shard_for(fp.hash());
        let mut map = shard.map.lock();
        if map.remove(fp.key()).is_some() {
            self.current_bytes.fetch_sub(self.page_bytes as u64, Ordering::SeqCst);
        }
    }

    /// Removes every entry. Concurrency note: linearizes after every call
    /// that returned before it was invoked and before every call beginning
    /// after it returns, but takes no single global lock across shards —
    /// each shard is cleared independently.
    pub fn invalidate_all(&self) {
        for shard in &self.shards {
            let mut map = shard.map.lock();
            let removed = map.len() as u64;
            map.clear();
            if removed > 0 {
                self.current_bytes.fetch_sub(removed * self.page_bytes as u64, Ordering::SeqCst);
            }
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}
