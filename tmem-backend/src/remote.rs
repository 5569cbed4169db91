//! # Remote Backend
//!
//! Grounded on `tmem_kvm.c`: the original marshals a request into a single
//! page, resolves the caller's virtual addresses to physical ones with
//! `virt_to_phys`, and crosses into the hypervisor with
//! `kvm_hypercall2(KVM_HC_TMEM, op, page_to_phys(page))`. The `Request`
//! variants below mirror `struct tmem_put_request` / `tmem_get_request` /
//! `tmem_invalidate_request` in `tmem.h`.
//!
//! `AddressTranslator` stands in for `virt_to_phys`; `Transport` stands in
//! for the hypercall itself. Both are traits a caller supplies — this crate
//! never implements a real one (see `tmem-client::LoopbackTransport` for the
//! in-process stand-in used by tests and benchmarks).
//!
//! The control region carries owned copies of the key/value bytes rather
//! than literal physical addresses: reconstructing a slice from a raw
//! physical address would need `unsafe` pointer arithmetic that has no safe
//! meaning outside a real guest/host memory mapping. Owned copies are the
//! safe-Rust equivalent of "write into the shared page" and preserve the
//! request shapes and addresses (computed via `AddressTranslator`, carried
//! for parity with the original and for transports that do have real
//! physical memory to write through) without requiring `unsafe` anywhere in
//! this crate.

use parking_lot::Mutex;
use tmem_common::{TmemResult, PAGE_BYTES};

/// Resolves a local pointer to whatever "physical address" a real transport
/// would need. Stands in for `virt_to_phys`.
pub trait AddressTranslator: Send + Sync {
    fn to_remote_addr(&self, ptr: usize) -> u64;
}

/// Identity translator: echoes the pointer value back as a `u64`, the only
/// sensible behavior when sender and receiver share one address space.
pub struct IdentityAddressTranslator;

impl AddressTranslator for IdentityAddressTranslator {
    fn to_remote_addr(&self, ptr: usize) -> u64 {
        ptr as u64
    }
}

/// The tagged request written into a `ControlRegion`, matching the three
/// request structs the original defines.
#[derive(Debug, Clone)]
pub enum Request {
    Put { key_phys: u64, key_len: usize, value_phys: u64, value_len: usize },
    Get { key_phys: u64, key_len: usize, value_phys: u64, value_lenp_phys: u64 },
    Invalidate { key_phys: u64, key_len: usize },
}

/// Version byte for the control region's wire shape, bumped if the record
/// layout ever changes. Carried so a future transport can reject a region
/// it doesn't understand instead of misreading it.
pub const CONTROL_VERSION: u8 = 1;

/// One page's worth of request/response state, reused across calls and
/// serialized by the backend's own lock.
pub struct ControlRegion {
    version: u8,
    request: Option<Request>,
    key_buf: Vec<u8>,
    value_buf: Vec<u8>,
    found: bool,
    response_len: usize,
}

impl ControlRegion {
    fn new() -> Self {
        ControlRegion {
            version: CONTROL_VERSION,
            request: None,
            key_buf: Vec::new(),
            value_buf: Vec::new(),
            found: false,
            response_len: 0,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn key(&self) -> &[u8] {
        &self.key_buf
    }

    pub fn value(&self) -> &[u8] {
        &self.value_buf
    }

    pub fn set_value(&mut self, value: Vec<u8>) {
        self.value_buf = value;
    }

    pub fn set_found(&mut self, found: bool) {
        self.found = found;
    }

    pub fn found(&self) -> bool {
        self.found
    }

    pub fn set_response_len(&mut self, len: usize) {
        self.response_len = len;
    }

    pub fn response_len(&self) -> usize {
        self.response_len
    }
}

/// The opaque call that crosses into the remote store. Stands in for
/// `kvm_hypercall2`. Implementations report a genuine transport failure as
/// `TmemError::TransportError`; any other `TmemError` returned is treated
/// as a domain result from the far side (e.g. `CapacityExhausted` on a
/// `Put`) and passed through verbatim.
pub trait Transport: Send + Sync {
    fn send(&self, region: &mut ControlRegion) -> TmemResult<()>;
}

/// A backend that marshals every call through a `ControlRegion` and an
/// opaque `Transport`, serialized by its own lock independent of the
/// request plane's.
pub struct RemoteBackend {
    transport: Box<dyn Transport>,
    translator: Box<dyn AddressTranslator>,
    region: Mutex<ControlRegion>,
}

impl RemoteBackend {
    pub fn new(transport: Box<dyn Transport>, translator: Box<dyn AddressTranslator>) -> Self {
        RemoteBackend { transport, translator, region: Mutex::new(ControlRegion::new()) }
    }
}

impl crate::backend::TmemBackend for RemoteBackend {
    fn put(&self, key: &[u8], value: &[u8]) -> TmemResult<()> {
        let mut region = self.region.lock();
        region.key_buf = key.to_vec();
        let truncated = value.len().min(PAGE_BYTES);
        region.value_buf = value[..truncated].to_vec();
        region.request = Some(Request::Put {
            key_phys: self.translator.to_remote_addr(key.as_ptr() as usize),
            key_len: key.len(),
            value_phys: self.translator.to_remote_addr(value.as_ptr() as usize),
            value_len: truncated,
        });
        self.transport.send(&mut region)
    }

    fn get(&self, key: &[u8], out: &mut [u8]) -> TmemResult<usize> {
        let mut region = self.region.lock();
        region.key_buf = key.to_vec();
        region.value_buf.clear();
        region.found = false;
        region.response_len = 0;
        region.request = Some(Request::Get {
            key_phys: self.translator.to_remote_addr(key.as_ptr() as usize),
            key_len: key.len(),
            value_phys: self.translator.to_remote_addr(out.as_ptr() as usize),
            value_lenp_phys: self.translator.to_remote_addr(out.as_ptr() as usize),
        });
        self.transport.send(&mut region)?;

        if !region.found {
            return Err(tmem_common::TmemError::NotFound);
        }
        let copy_len = region.response_len.min(out.len());
        out[..copy_len].copy_from_slice(&region.value_buf[..copy_len]);
        Ok(region.response_len)
    }

    fn invalidate(&self, key: &[u8]) {
        let mut region = self.region.lock();
        region.key_buf = key.to_vec();
        region.request = Some(Request::Invalidate {
            key_phys: self.translator.to_remote_addr(key.as_ptr() as usize),
            key_len: key.len(),
        });
        // Invalidation of a single key never fails the way Put/Get can
        // (there is no capacity ceiling to trip and a miss is not an
        // error), so a transport error here has nowhere caller-visible to
        // go; it is swallowed the same way `Store::invalidate` swallows a
        // miss on an absent key.
        let _ = self.transport.send(&mut region);
    }

    fn invalidate_all(&self) {
        // The wire `Request` enum has no dedicated "invalidate everything"
        // variant, matching `tmem.h`'s three request structs. A zero-length
        // key on an `Invalidate` is the convention a `Transport` reads as
        // "clear the whole remote store" rather than a single-key miss.
        let mut region = self.region.lock();
        region.request = Some(Request::Invalidate { key_phys: 0, key_len: 0 });
        region.key_buf.clear();
        let _ = self.transport.send(&mut region);
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TmemBackend;
    use std::sync::Mutex as StdMutex;
    use tmem_common::TmemError;

    /// An in-test transport that just runs a closure against the region,
    /// avoiding a dependency on `tmem-client` from within this crate's own
    /// unit tests.
    struct FnTransport<F: Fn(&mut ControlRegion) -> TmemResult<()> + Send + Sync>(F);

    impl<F: Fn(&mut ControlRegion) -> TmemResult<()> + Send + Sync> Transport for FnTransport<F> {
        fn send(&self, region: &mut ControlRegion) -> TmemResult<()> {
            (self.0)(region)
        }
    }

    #[test]
    fn put_populates_request_and_succeeds() {
        let seen = StdMutex::new(None);
        let backend = RemoteBackend::new(
            Box::new(FnTransport(|region: &mut ControlRegion| {
                if let Some(Request::Put { value_len, .. }) = region.request() {
                    assert_eq!(*value_len, 3);
                }
                region.set_response_len(0);
                Ok(())
            })),
            Box::new(IdentityAddressTranslator),
        );
        let _ = &seen;
        backend.put(b"k", b"abc").unwrap();
    }

    #[test]
    fn get_not_found_when_region_reports_absent() {
        let backend = RemoteBackend::new(
            Box::new(FnTransport(|region: &mut ControlRegion| {
                region.set_found(false);
                Ok(())
            })),
            Box::new(IdentityAddressTranslator),
        );
        let mut out = [0u8; 16];
        assert_eq!(backend.get(b"k", &mut out), Err(TmemError::NotFound));
    }

    #[test]
    fn get_copies_response_into_caller_buffer() {
        let backend = RemoteBackend::new(
            Box::new(FnTransport(|region: &mut ControlRegion| {
                region.set_found(true);
                region.set_value(b"hello".to_vec());
                region.set_response_len(5);
                Ok(())
            })),
            Box::new(IdentityAddressTranslator),
        );
        let mut out = [0u8; 16];
        let len = backend.get(b"k", &mut out).unwrap();
        assert_eq!(len, 5);
        assert_eq!(&out[..len], b"hello");
    }

    #[test]
    fn transport_failure_propagates_verbatim() {
        let backend = RemoteBackend::new(
            Box::new(FnTransport(|_region: &mut ControlRegion| Err(TmemError::TransportError))),
            Box::new(IdentityAddressTranslator),
        );
        assert_eq!(backend.put(b"k", b"v"), Err(TmemError::TransportError));
    }
}
