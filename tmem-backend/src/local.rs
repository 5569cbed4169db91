//! # Local Backend
//!
//! Thin adapter over `tmem_store::Store`: every `put`/`get` copies bytes
//! both ways, the simplest and slowest of the backend family, trading a
//! per-call memcpy for a caller-owned buffer on both sides of the call.

use tmem_common::{TmemConfig, TmemError, TmemResult};
use tmem_store::{PutOutcome, Store};

use crate::backend::TmemBackend;

pub struct LocalBackend {
    store: Store,
}

impl LocalBackend {
    pub fn new() -> Self {
        LocalBackend { store: Store::new() }
    }

    pub fn with_config(config: TmemConfig) -> Self {
        LocalBackend { store: Store::with_config(config) }
    }

    /// Entries currently held, for diagnostics and tests.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn current_bytes(&self) -> u64 {
        self.store.current_bytes()
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        LocalBackend::new()
    }
}

impl TmemBackend for LocalBackend {
    fn put(&self, key: &[u8], value: &[u8]) -> TmemResult<()> {
        let span = tracing::debug_span!("local_backend_put", key_len = key.len(), value_len = value.len());
        let _enter = span.enter();
        match self.store.put(key, value) {
            PutOutcome::Inserted | PutOutcome::Updated => Ok(()),
            PutOutcome::CapacityExhausted => Err(TmemError::CapacityExhausted),
        }
    }

    fn get(&self, key: &[u8], out: &mut [u8]) -> TmemResult<usize> {
        match self.store.get(key) {
            Some((bytes, len)) => {
                let copy_len = len.min(out.len());
                out[..copy_len].copy_from_slice(&bytes[..copy_len]);
                Ok(len)
            }
            None => Err(TmemError::NotFound),
        }
    }

    fn invalidate(&self, key: &[u8]) {
        self.store.invalidate(key);
    }

    fn invalidate_all(&self) {
        self.store.invalidate_all();
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let backend = LocalBackend::new();
        backend.put(b"k", b"v").unwrap();
        let mut out = [0u8; 16];
        let len = backend.get(b"k", &mut out).unwrap();
        assert_eq!(&out[..len], b"v");
    }

    #[test]
    fn get_on_absent_key_is_not_found() {
        let backend = LocalBackend::new();
        let mut out = [0u8; 16];
        assert_eq!(backend.get(b"missing", &mut out), Err(TmemError::NotFound));
    }

    #[test]
    fn invalidate_then_get_is_not_found() {
        let backend = LocalBackend::new();
        backend.put(b"k", b"v").unwrap();
        backend.invalidate(b"k");
        let mut out = [0u8; 16];
        assert_eq!(backend.get(b"k", &mut out), Err(TmemError::NotFound));
    }

    #[test]
    fn capacity_exhaustion_surfaces_as_backend_error() {
        let mut cfg = TmemConfig::default();
        cfg.pool_bytes = cfg.page_bytes as u64;
        cfg.shard_count = 1;
        let backend = LocalBackend::with_config(cfg);
        backend.put(b"k1", b"v").unwrap();
        assert_eq!(backend.put(b"k2", b"v"), Err(TmemError::CapacityExhausted));
    }
}
