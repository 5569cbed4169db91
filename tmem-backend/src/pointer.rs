//! # Pointer Backend
//!
//! Grounded on `tmem_ptr.c`'s `tmem_ptr_put_page`/`_get_page`, which store
//! the caller's `value` pointer directly instead of copying it — the
//! fastest backend, at the cost of the put caller's buffer becoming owned
//! by the store. The hazard in the original: a `get` handed back the raw
//! `unsigned long *address` with no lifetime guarantee, so a concurrent
//! `invalidate` (which frees the backing page) could leave a reader holding
//! a dangling pointer.
//!
//! This is closed here with `Arc`-refcounting: every stored value is an
//! `Arc<Vec<u8>>`; `get_borrowed` clones the `Arc` before returning, so the
//! backing bytes outlive a concurrent `invalidate` for as long as the
//! borrow is held.

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::Mutex;
use tmem_common::{TmemConfig, TmemError, TmemResult};
use tmem_store::fingerprint;

use crate::backend::TmemBackend;

struct PointerShard {
    map: Mutex<HashMap<Vec<u8>, Arc<Vec<u8>>, RandomState>>,
}

impl PointerShard {
    fn new() -> Self {
        PointerShard { map: Mutex::new(HashMap::with_hasher(RandomState::new())) }
    }
}

/// A refcounted, zero-copy-on-read handle into a stored value. Keeps the
/// backing bytes alive until dropped, even if the entry is invalidated out
/// from under it.
pub struct PointerBorrow {
    value: Arc<Vec<u8>>,
}

impl Deref for PointerBorrow {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.value
    }
}

/// A backend that aliases stored buffers instead of copying them on every
/// call, defaulting to a larger pool than the Local backend since it never
/// pays a per-entry copy cost.
pub struct PointerBackend {
    shards: Vec<PointerShard>,
    shard_mask: usize,
    page_bytes: usize,
    pool_bytes: u64,
    current_bytes: AtomicU64,
}

impl PointerBackend {
    pub fn new() -> Self {
        PointerBackend::with_config(TmemConfig::for_pointer_backend())
    }

    pub fn with_config(config: TmemConfig) -> Self {
        let shard_count = config.shard_count.max(1).next_power_of_two();
        let shards = (0..shard_count).map(|_| PointerShard::new()).collect();
        PointerBackend {
            shards,
            shard_mask: shard_count - 1,
            page_bytes: config.page_bytes,
            pool_bytes: config.pool_bytes,
            current_bytes: AtomicU64::new(0),
        }
    }

    fn shard_for(&self, hash: u64) -> &PointerShard {
        &self.shards[(hash as usize) & self.shard_mask]
    }

    pub fn current_bytes(&self) -> u64 {
        self.current_bytes.load(Ordering::SeqCst)
    }

    /// Stores `value` by taking ownership of it directly, the zero-copy
    /// fast path. The uniform `TmemBackend::put` below calls this after
    /// copying the caller's slice once, since the trait boundary only ever
    /// hands out borrowed slices.
    pub fn put_owned(&self, key: Vec<u8>, value: Vec<u8>) -> TmemResult<()> {
        let fp = fingerprint(&key);
        let truncated_len = value.len().min(self.page_bytes);
        let mut value = value;
        value.truncate(truncated_len);

        let shard = self.shard_for(fp.hash());
        let mut map = shard.map.lock();

        if let Some(slot) = map.get_mut(fp.key()) {
            *slot = Arc::new(value);
            return Ok(());
        }

        let would_be_bytes = self.current_bytes.load(Ordering::SeqCst) + self.page_bytes as u64;
        if would_be_bytes > self.pool_bytes {
            return Err(TmemError::CapacityExhausted);
        }

        map.insert(fp.into_key(), Arc::new(value));
        self.current_bytes.fetch_add(self.page_bytes as u64, Ordering::SeqCst);
        Ok(())
    }

    /// Returns a refcounted borrow of the stored value, without copying.
    pub fn get_borrowed(&self, key: &[u8]) -> Option<PointerBorrow> {
        let fp = fingerprint(key);
        let shard = self.shard_for(fp.hash());
        let map = shard.map.lock();
        map.get(fp.key()).cloned().map(|value| PointerBorrow { value })
    }
}

impl Default for PointerBackend {
    fn default() -> Self {
        PointerBackend::new()
    }
}

impl TmemBackend for PointerBackend {
    fn put(&self, key: &[u8], value: &[u8]) -> TmemResult<()> {
        self.put_owned(key.to_vec(), value.to_vec())
    }

    fn get(&self, key: &[u8], out: &mut [u8]) -> TmemResult<usize> {
        match self.get_borrowed(key) {
            Some(borrow) => {
                let copy_len = borrow.len().min(out.len());
                out[..copy_len].copy_from_slice(&borrow[..copy_len]);
                Ok(borrow.len())
            }
            None => Err(TmemError::NotFound),
        }
    }

    fn invalidate(&self, key: &[u8]) {
        let fp = fingerprint(key);
        let shard = self.shard_for(fp.hash());
        let mut map = shard.map.lock();
        if map.remove(fp.key()).is_some() {
            self.current_bytes.fetch_sub(self.page_bytes as u64, Ordering::SeqCst);
        }
    }

    fn invalidate_all(&self) {
        for shard in &self.shards {
            let mut map = shard.map.lock();
            let removed = map.len() as u64;
            map.clear();
            if removed > 0 {
                self.current_bytes.fetch_sub(removed * self.page_bytes as u64, Ordering::SeqCst);
            }
        }
    }

    fn name(&self) -> &'static str {
        "pointer"
    }
}
