//! # Loopback Transport
//!
//! An in-process stand-in for the real hypercall transport the Remote
//! backend expects, so it is exercisable in tests and benchmarks without a
//! hypervisor: this transport answers requests against an in-process
//! `tmem_store::Store` instead of dialing out over a real connection.

use std::sync::Arc;

use tmem_backend::remote::{ControlRegion, Request, Transport};
use tmem_common::TmemResult;
use tmem_store::{PutOutcome, Store};

/// Backs the Remote backend with an in-process store, answering every
/// `Request` the same call would otherwise carry across a real hypercall.
pub struct LoopbackTransport {
    store: Arc<Store>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        LoopbackTransport { store: Arc::new(Store::new()) }
    }

    /// Shares an existing store, letting a test or benchmark inspect it
    /// independent of the Remote backend that dispatches through this
    /// transport.
    pub fn with_store(store: Arc<Store>) -> Self {
        LoopbackTransport { store }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        LoopbackTransport::new()
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, region: &mut ControlRegion) -> TmemResult<()> {
        match region.request() {
            Some(Request::Put { value_len, .. }) => {
                let key = region.key().to_vec();
                let value = region.value()[..*value_len].to_vec();
                match self.store.put(&key, &value) {
                    PutOutcome::CapacityExhausted => Err(tmem_common::TmemError::CapacityExhausted),
                    PutOutcome::Inserted | PutOutcome::Updated => Ok(()),
                }
            }
            Some(Request::Get { .. }) => {
                let key = region.key().to_vec();
                match self.store.get(&key) {
                    Some((bytes, len)) => {
                        region.set_value(bytes);
                        region.set_response_len(len);
                        region.set_found(true);
                    }
                    None => region.set_found(false),
                }
                Ok(())
            }
            Some(Request::Invalidate { key_len, .. }) => {
                if *key_len == 0 {
                    self.store.invalidate_all();
                } else {
                    let key = region.key().to_vec();
                    self.store.invalidate(&key);
                }
                Ok(())
            }
            None => Err(tmem_common::TmemError::InvalidCommand),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmem_backend::remote::IdentityAddressTranslator;
    use tmem_backend::{RemoteBackend, TmemBackend};

    #[test]
    fn put_then_get_round_trips_through_loopback() {
        let backend = RemoteBackend::new(Box::new(LoopbackTransport::new()), Box::new(IdentityAddressTranslator));
        backend.put(b"k", b"hello").unwrap();
        let mut out = [0u8; 16];
        let len = backend.get(b"k", &mut out).unwrap();
        assert_eq!(&out[..len], b"hello");
    }

    #[test]
    fn invalidate_removes_entry() {
        let backend = RemoteBackend::new(Box::new(LoopbackTransport::new()), Box::new(IdentityAddressTranslator));
        backend.put(b"k", b"v").unwrap();
        backend.invalidate(b"k");
        let mut out = [0u8; 16];
        assert_eq!(backend.get(b"k", &mut out), Err(tmem_common::TmemError::NotFound));
    }

    #[test]
    fn invalidate_all_clears_the_shared_store() {
        let backend = RemoteBackend::new(Box::new(LoopbackTransport::new()), Box::new(IdentityAddressTranslator));
        backend.put(b"a", b"1").unwrap();
        backend.put(b"b", b"2").unwrap();
        backend.invalidate_all();
        let mut out = [0u8; 16];
        assert_eq!(backend.get(b"a", &mut out), Err(tmem_common::TmemError::NotFound));
        assert_eq!(backend.get(b"b", &mut out), Err(tmem_common::TmemError::NotFound));
    }
}
