//! # Request Plane
//!
//! Mirrors a kernel character device's `ioctl` dispatch: a small closed set
//! of command codes (`PUT`/`GET`/`INVALIDATE`/`CONTROL`/`GENERATE_SIZE`),
//! each served by a single non-reentrant critical section, with the
//! mode-bit checks in `put`/`get`/`invalidate` mapping directly onto that
//! device's bit-test-and-early-return dispatch shape.
//!
//! A counted semaphore plus `down_trylock` becomes a single
//! non-reentrant `parking_lot::Mutex` guarding command dispatch, returning
//! `Busy` on contention instead of blocking. The device's open/release pair
//! becomes [`TmemHandle`]'s constructor and `Drop` impl, backed by an
//! `AtomicBool` singleton rather than a counted semaphore since the
//! original only ever permits one open handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tmem_backend::TmemBackend;
use tmem_common::{
    GenerateSize, GetRequest, IoctlCommand, InvalRequest, ModeBits, ModeRegister, PutRequest, TmemConfig,
    TmemError, TmemResult,
};

use crate::stats::{PlaneStats, PlaneStatsSnapshot};

/// The process-wide dispatcher: one registered backend, one mode register,
/// one `GenerateSize` register, and the single command lock every call
/// serializes through.
pub struct TmemPlane {
    backend: Arc<dyn TmemBackend>,
    mode: ModeRegister,
    generate_size: GenerateSize,
    config: TmemConfig,
    command_lock: Mutex<()>,
    handle_open: AtomicBool,
    stats: PlaneStats,
}

impl TmemPlane {
    pub fn new(backend: Arc<dyn TmemBackend>) -> Arc<Self> {
        TmemPlane::with_config(backend, TmemConfig::default())
    }

    pub fn with_config(backend: Arc<dyn TmemBackend>, config: TmemConfig) -> Arc<Self> {
        for command in IoctlCommand::all() {
            tracing::info!(command = %command, "registered tmem command");
        }
        Arc::new(TmemPlane {
            backend,
            mode: ModeRegister::new(),
            generate_size: GenerateSize::new(),
            config,
            command_lock: Mutex::new(()),
            handle_open: AtomicBool::new(false),
            stats: PlaneStats::new(),
        })
    }

    /// Opens the single handle this plane permits. A second open before the
    /// first is dropped returns `Busy`.
    pub fn open(self: &Arc<Self>) -> TmemResult<TmemHandle> {
        if self.handle_open.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Err(TmemError::Busy);
        }
        Ok(TmemHandle { plane: Arc::clone(self), scratch: vec![0u8; self.config.tmem_max] })
    }

    pub fn stats(&self) -> PlaneStatsSnapshot {
        self.stats.snapshot()
    }

    fn lock_command(&self) -> TmemResult<parking_lot::MutexGuard<'_, ()>> {
        self.command_lock.try_lock().ok_or(TmemError::Busy)
    }

    fn dispatch_to_backend<T>(&self, op: impl FnOnce(&Arc<dyn TmemBackend>) -> TmemResult<T>) -> TmemResult<T> {
        let start = Instant::now();
        let result = op(&self.backend);
        self.stats.record_backend_dispatch(self.backend.name(), start.elapsed());
        result
    }

    /// `PUT`: stores `value` under `key`. `GENERATE` is rejected as
    /// `InvalidCommand` (Open Question 2) since a fabricated write has no
    /// sensible caller-visible contract; `DUMMY` short-circuits before the
    /// backend is touched; `SLEEPY` delays dispatch.
    pub fn put(&self, key: &[u8], value: &[u8], flags: ModeBits) -> TmemResult<()> {
        let _guard = self.lock_command()?;
        self.stats.record_put();

        if key.len() > self.config.key_max {
            return Err(TmemError::KeyTooLong);
        }
        if value.len() > self.config.tmem_max {
            return Err(TmemError::Overflow);
        }

        let mode = self.mode.effective(Some(flags));
        if mode.generate() {
            return Err(TmemError::InvalidCommand);
        }
        if mode.sleepy() {
            std::thread::sleep(self.config.sleepy_delay());
        }
        if mode.dummy() {
            return Ok(());
        }

        self.dispatch_to_backend(|backend| backend.put(key, value)).map_err(TmemError::at_request_plane)
    }

    /// `GET`: copies the value stored under `key` into `out`, returning its
    /// length. A backend miss is coerced to `Ok(0)` rather than surfaced as
    /// `NotFound` — the request plane's contract is "zero-length on a miss",
    /// matching `tmem_chrdev_ioctl`'s handling of a negative `tmem_get_page`.
    ///
    /// Mode priority on a `GET` (Open Question 1): `DUMMY` wins over
    /// `GENERATE` when both are set, matching the source's `TCTRL_DUMMY_BIT`
    /// check short-circuiting before any other mode logic runs.
    pub fn get(&self, key: &[u8], out: &mut [u8], flags: ModeBits) -> TmemResult<usize> {
        let _guard = self.lock_command()?;
        self.stats.record_get();

        if key.len() > self.config.key_max {
            return Err(TmemError::KeyTooLong);
        }

        let mode = self.mode.effective(Some(flags));

        if mode.dummy() {
            return Ok(0);
        }
        if mode.sleepy() {
            std::thread::sleep(self.config.sleepy_delay());
        }
        if mode.generate() {
            let len = (self.generate_size.get() as usize).min(out.len());
            return Ok(len);
        }

        if mode.silent() {
            // Still queries the backend (and is still timed/counted as a
            // dispatch) so `SILENT` measures real lookup cost; only the
            // copy-out to the caller is suppressed.
            let mut scratch = vec![0u8; self.config.page_bytes];
            return match self.dispatch_to_backend(|backend| backend.get(key, &mut scratch)) {
                Ok(_) | Err(TmemError::NotFound) => Ok(0),
                Err(other) => Err(other.at_request_plane()),
            };
        }

        match self.dispatch_to_backend(|backend| backend.get(key, out)) {
            Ok(len) => {
                if len > out.len() {
                    // The backend reports more bytes than fit in the
                    // caller's buffer; the plane never silently truncates a
                    // copy-out, matching the trust-boundary contract a real
                    // copy_to_user would enforce.
                    return Err(TmemError::TransientAbort);
                }
                Ok(len)
            }
            Err(TmemError::NotFound) => Ok(0),
            Err(other) => Err(other.at_request_plane()),
        }
    }

    /// `INVALIDATE`: removes `key`. Idempotent on an absent key.
    pub fn invalidate(&self, key: &[u8], flags: ModeBits) -> TmemResult<()> {
        let _guard = self.lock_command()?;
        self.stats.record_invalidate();

        if key.len() > self.config.key_max {
            return Err(TmemError::KeyTooLong);
        }

        let mode = self.mode.effective(Some(flags));
        if mode.sleepy() {
            std::thread::sleep(self.config.sleepy_delay());
        }
        if mode.dummy() {
            return Ok(());
        }

        self.dispatch_to_backend(|backend| {
            backend.invalidate(key);
            Ok(())
        })
        .map_err(TmemError::at_request_plane)
    }

    /// `INVALIDATE_ALL`: removes every entry.
    pub fn invalidate_all(&self) -> TmemResult<()> {
        let _guard = self.lock_command()?;
        self.dispatch_to_backend(|backend| {
            backend.invalidate_all();
            Ok(())
        })
        .map_err(TmemError::at_request_plane)
    }

    /// `CONTROL`: replaces the process-wide mode register wholesale.
    pub fn control(&self, bits: u64) -> TmemResult<()> {
        let _guard = self.lock_command()?;
        self.stats.record_control();
        let mode = ModeBits::from_bits(bits).ok_or(TmemError::InvalidCommand)?;
        self.mode.set(mode);
        Ok(())
    }

    /// `GENERATE_SIZE`: sets the fabricated-response length `GENERATE` mode
    /// uses on `GET`.
    pub fn generate_size(&self, value: u64) -> TmemResult<()> {
        let _guard = self.lock_command()?;
        self.stats.record_generate();
        self.generate_size.set(value);
        Ok(())
    }

    fn release(&self) {
        self.handle_open.store(false, Ordering::SeqCst);
    }
}

/// A single open handle onto a [`TmemPlane`], owning a scratch buffer sized
/// `TMEM_MAX`. Dropping the handle releases the plane's open-handle slot.
pub struct TmemHandle {
    plane: Arc<TmemPlane>,
    scratch: Vec<u8>,
}

impl TmemHandle {
    pub fn put(&mut self, key: &[u8], value: &[u8], flags: ModeBits) -> TmemResult<()> {
        self.plane.put(key, value, flags)
    }

    /// Decodes a `PUT` off a wire-framed [`PutRequest`], the ioctl-payload
    /// shape a real copy-in would hand the request plane. `key`/`value` are
    /// the bytes already copied in from `req.key_ptr`/`req.value_ptr`; this
    /// call validates their lengths against the request's own `key_len`/
    /// `value_len` fields before dispatching, the same check a real
    /// copy-in would need to make against a caller-supplied length.
    pub fn submit_put(&mut self, req: PutRequest, key: &[u8], value: &[u8]) -> TmemResult<()> {
        if key.len() != req.key_len || value.len() != req.value_len {
            return Err(TmemError::TransientAbort);
        }
        let flags = req.mode_override().ok_or(TmemError::InvalidCommand)?;
        self.put(key, value, flags)
    }

    /// Performs a `GET`, writing the result into this handle's scratch
    /// buffer. Returns the copied length; read it back with [`Self::value`].
    pub fn get(&mut self, key: &[u8], flags: ModeBits) -> TmemResult<usize> {
        self.plane.get(key, &mut self.scratch, flags)
    }

    /// Decodes a `GET` off a wire-framed [`GetRequest`]. `value_ptr`/
    /// `value_lenp` name the caller's copy-out destination and length-back
    /// address; this handle always copies into its own scratch buffer
    /// instead (see [`Self::scratch`]), so only `key_len` and `flags` are
    /// consulted here.
    pub fn submit_get(&mut self, req: GetRequest, key: &[u8]) -> TmemResult<usize> {
        if key.len() != req.key_len {
            return Err(TmemError::TransientAbort);
        }
        let flags = req.mode_override().ok_or(TmemError::InvalidCommand)?;
        self.get(key, flags)
    }

    /// The bytes written by the most recent `get` call, up to the length it
    /// returned. Callers should slice this with that length.
    pub fn scratch(&self) -> &[u8] {
        &self.scratch
    }

    pub fn invalidate(&self, key: &[u8], flags: ModeBits) -> TmemResult<()> {
        self.plane.invalidate(key, flags)
    }

    /// Decodes an `INVALIDATE` off a wire-framed [`InvalRequest`].
    pub fn submit_invalidate(&self, req: InvalRequest, key: &[u8]) -> TmemResult<()> {
        if key.len() != req.key_len {
            return Err(TmemError::TransientAbort);
        }
        let flags = req.mode_override().ok_or(TmemError::InvalidCommand)?;
        self.invalidate(key, flags)
    }

    pub fn invalidate_all(&self) -> TmemResult<()> {
        self.plane.invalidate_all()
    }

    pub fn control(&self, bits: u64) -> TmemResult<()> {
        self.plane.control(bits)
    }

    pub fn generate_size(&self, value: u64) -> TmemResult<()> {
        self.plane.generate_size(value)
    }

    pub fn stats(&self) -> PlaneStatsSnapshot {
        self.plane.stats()
    }
}

impl Drop for TmemHandle {
    fn drop(&mut self) {
        self.plane.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmem_backend::remote::{ControlRegion, IdentityAddressTranslator, Transport};
    use tmem_backend::{LocalBackend, NullBackend, RemoteBackend};
    use tmem_common::{DUMMY, GENERATE, SILENT, SLEEPY};

    /// A transport that always fails, so a call through the plane observes
    /// the request-plane's own error vocabulary rather than the backend's.
    struct FailingTransport;

    impl Transport for FailingTransport {
        fn send(&self, _region: &mut ControlRegion) -> TmemResult<()> {
            Err(TmemError::TransportError)
        }
    }

    fn remote_plane_with_failing_transport() -> Arc<TmemPlane> {
        let backend = RemoteBackend::new(Box::new(FailingTransport), Box::new(IdentityAddressTranslator));
        TmemPlane::new(Arc::new(backend))
    }

    fn local_plane() -> Arc<TmemPlane> {
        TmemPlane::new(Arc::new(LocalBackend::new()))
    }

    // --- quantified invariants & end-to-end scenarios ---

    #[test]
    fn e1_put_then_get_round_trips() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        handle.put(b"k", b"hello", ModeBits::NONE).unwrap();
        let len = handle.get(b"k", ModeBits::NONE).unwrap();
        assert_eq!(&handle.scratch()[..len], b"hello");
    }

    #[test]
    fn e2_update_then_get_returns_latest_value() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        handle.put(b"k", b"first", ModeBits::NONE).unwrap();
        handle.put(b"k", b"second-value", ModeBits::NONE).unwrap();
        let len = handle.get(b"k", ModeBits::NONE).unwrap();
        assert_eq!(&handle.scratch()[..len], b"second-value");
    }

    #[test]
    fn e3_get_on_absent_key_returns_zero_length_not_an_error() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        let len = handle.get(b"missing", ModeBits::NONE).unwrap();
        assert_eq!(len, 0);
    }

    #[test]
    fn e4_no_prefix_collision_through_the_plane() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        handle.put(b"a", b"1", ModeBits::NONE).unwrap();
        handle.put(b"aa", b"22", ModeBits::NONE).unwrap();
        let len_a = handle.get(b"a", ModeBits::NONE).unwrap();
        assert_eq!(&handle.scratch()[..len_a], b"1");
        let len_aa = handle.get(b"aa", ModeBits::NONE).unwrap();
        assert_eq!(&handle.scratch()[..len_aa], b"22");
    }

    #[test]
    fn e5_capacity_exhaustion_surfaces_through_the_plane() {
        let mut cfg = TmemConfig::default();
        cfg.pool_bytes = cfg.page_bytes as u64;
        cfg.shard_count = 1;
        let plane = TmemPlane::with_config(Arc::new(LocalBackend::with_config(cfg)), TmemConfig::default());
        let mut handle = plane.open().unwrap();
        handle.put(b"k1", b"v", ModeBits::NONE).unwrap();
        assert_eq!(handle.put(b"k2", b"v", ModeBits::NONE), Err(TmemError::CapacityExhausted));
    }

    #[test]
    fn e6_second_open_is_busy_until_first_handle_drops() {
        let plane = local_plane();
        let first = plane.open().unwrap();
        assert_eq!(plane.open().err(), Some(TmemError::Busy));
        drop(first);
        assert!(plane.open().is_ok());
    }

    // --- mode-bit scenarios ---

    #[test]
    fn mode_scenario_dummy_put_then_get_sees_nothing_stored() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        handle.put(b"k", b"v", ModeBits::from_bits(DUMMY).unwrap()).unwrap();
        let len = handle.get(b"k", ModeBits::NONE).unwrap();
        assert_eq!(len, 0);
    }

    #[test]
    fn mode_scenario_generate_fabricates_response_length() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        handle.generate_size(4).unwrap();
        let len = handle.get(b"anything", ModeBits::from_bits(GENERATE).unwrap()).unwrap();
        assert_eq!(len, 4);
    }

    #[test]
    fn mode_scenario_dummy_wins_over_generate_on_get() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        handle.generate_size(4).unwrap();
        let len = handle.get(b"anything", ModeBits::from_bits(DUMMY | GENERATE).unwrap()).unwrap();
        assert_eq!(len, 0);
    }

    #[test]
    fn mode_scenario_silent_suppresses_copy_out_but_still_queries_backend() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        handle.control(SILENT).unwrap();
        handle.put(b"k", b"V", ModeBits::NONE).unwrap();
        let len = handle.get(b"k", ModeBits::NONE).unwrap();
        assert_eq!(len, 0);

        handle.control(0).unwrap();
        let len = handle.get(b"k", ModeBits::NONE).unwrap();
        assert_eq!(&handle.scratch()[..len], b"V");
    }

    #[test]
    fn mode_scenario_sleepy_observes_at_least_nine_milliseconds() {
        // Observed wall time must be at least 9ms against the default ~10ms
        // SLEEP_USECS delay.
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        let start = Instant::now();
        handle.put(b"k", b"v", ModeBits::from_bits(SLEEPY).unwrap()).unwrap();
        assert!(start.elapsed() >= std::time::Duration::from_millis(9));
    }

    #[test]
    fn put_with_generate_is_rejected() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        assert_eq!(
            handle.put(b"k", b"v", ModeBits::from_bits(GENERATE).unwrap()),
            Err(TmemError::InvalidCommand)
        );
    }

    #[test]
    fn key_longer_than_key_max_is_rejected() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        let long_key = vec![b'k'; TmemConfig::default().key_max + 1];
        assert_eq!(handle.put(&long_key, b"v", ModeBits::NONE), Err(TmemError::KeyTooLong));
    }

    #[test]
    fn value_longer_than_tmem_max_is_overflow() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        let long_value = vec![0u8; TmemConfig::default().tmem_max + 1];
        assert_eq!(handle.put(b"k", &long_value, ModeBits::NONE), Err(TmemError::Overflow));
    }

    #[test]
    fn undersized_out_buffer_on_get_is_transient_abort() {
        let plane = TmemPlane::new(Arc::new(LocalBackend::new()));
        let mut tiny = [0u8; 2];
        let mut handle = plane.open().unwrap();
        handle.put(b"k", b"longer-than-two", ModeBits::NONE).unwrap();
        assert_eq!(plane.get(b"k", &mut tiny, ModeBits::NONE), Err(TmemError::TransientAbort));
    }

    #[test]
    fn invalidate_all_clears_every_entry() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        handle.put(b"a", b"1", ModeBits::NONE).unwrap();
        handle.put(b"b", b"2", ModeBits::NONE).unwrap();
        handle.invalidate_all().unwrap();
        assert_eq!(handle.get(b"a", ModeBits::NONE).unwrap(), 0);
        assert_eq!(handle.get(b"b", ModeBits::NONE).unwrap(), 0);
    }

    #[test]
    fn stats_track_command_counts_and_backend_dispatches() {
        let plane = TmemPlane::new(Arc::new(NullBackend::new()));
        let mut handle = plane.open().unwrap();
        handle.put(b"k", b"v", ModeBits::NONE).unwrap();
        handle.get(b"k", ModeBits::NONE).unwrap();
        handle.invalidate(b"k", ModeBits::NONE).unwrap();
        let snap = handle.stats();
        assert_eq!(snap.puts, 1);
        assert_eq!(snap.gets, 1);
        assert_eq!(snap.invalidates, 1);
        assert_eq!(snap.dispatch_counts, vec![("null", 3)]);
    }

    // --- wire-framed submit entry points ---

    #[test]
    fn submit_put_then_submit_get_round_trip_through_wire_requests() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        let key = b"k";
        let value = b"hello";
        let put_req = PutRequest::new(key.as_ptr() as usize, key.len(), value.as_ptr() as usize, value.len(), 0);
        handle.submit_put(put_req, key, value).unwrap();

        let get_req = GetRequest::new(key.as_ptr() as usize, key.len(), 0, 0, 0);
        let len = handle.submit_get(get_req, key).unwrap();
        assert_eq!(&handle.scratch()[..len], b"hello");
    }

    #[test]
    fn submit_put_rejects_a_key_length_mismatched_with_the_request() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        let key = b"k";
        let value = b"v";
        let req = PutRequest::new(key.as_ptr() as usize, key.len() + 1, value.as_ptr() as usize, value.len(), 0);
        assert_eq!(handle.submit_put(req, key, value), Err(TmemError::TransientAbort));
    }

    #[test]
    fn submit_invalidate_decodes_flags_and_removes_the_key() {
        let plane = local_plane();
        let mut handle = plane.open().unwrap();
        let key = b"k";
        handle.put(key, b"v", ModeBits::NONE).unwrap();
        let req = InvalRequest::new(key.as_ptr() as usize, key.len(), 0);
        handle.submit_invalidate(req, key).unwrap();
        assert_eq!(handle.get(key, ModeBits::NONE).unwrap(), 0);
    }

    // --- request-plane error coercion ---

    #[test]
    fn put_surfaces_transport_failure_as_transient_abort() {
        let plane = remote_plane_with_failing_transport();
        let mut handle = plane.open().unwrap();
        assert_eq!(handle.put(b"k", b"v", ModeBits::NONE), Err(TmemError::TransientAbort));
    }

    #[test]
    fn get_surfaces_transport_failure_as_transient_abort() {
        let plane = remote_plane_with_failing_transport();
        let mut handle = plane.open().unwrap();
        assert_eq!(handle.get(b"k", ModeBits::NONE), Err(TmemError::TransientAbort));
    }

    #[test]
    fn silent_get_surfaces_transport_failure_as_transient_abort() {
        let plane = remote_plane_with_failing_transport();
        let mut handle = plane.open().unwrap();
        handle.control(SILENT).unwrap();
        assert_eq!(handle.get(b"k", ModeBits::NONE), Err(TmemError::TransientAbort));
    }

}
