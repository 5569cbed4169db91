//! # Client Facade
//!
//! A small named-verb wrapper around a [`TmemHandle`]: `put`/`get`/
//! `invalidate`/`invalidate_all`/`control`/`set_generate_size` instead of
//! the plane's lower-level `flags`-parameterized calls. There is no socket
//! or connection pool to manage here — the request plane is an in-process
//! API, not a server to dial — so opening a client is just opening a
//! handle.

use tmem_common::{GetRequest, InvalRequest, PutRequest, TmemResult};
use tmem_plane::{TmemHandle, TmemPlane};

use std::sync::Arc;

/// A single client's view onto a [`TmemPlane`], opened for the caller's
/// convenience and closed automatically on drop.
pub struct TmemClient {
    handle: TmemHandle,
}

impl TmemClient {
    /// Opens a handle on `plane`. Fails with `Busy` if another client
    /// already holds the plane's single open handle.
    pub fn open(plane: &Arc<TmemPlane>) -> TmemResult<Self> {
        Ok(TmemClient { handle: plane.open()? })
    }

    /// Frames the call as a [`PutRequest`] before handing it to the handle,
    /// matching the ioctl-payload shape the request plane decodes.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> TmemResult<()> {
        let req = PutRequest::new(key.as_ptr() as usize, key.len(), value.as_ptr() as usize, value.len(), 0);
        self.handle.submit_put(req, key, value)
    }

    /// Returns the stored value, or an empty vector on a miss — the plane's
    /// own zero-length-on-miss contract, carried through unchanged rather
    /// than reinvented as an `Option`.
    pub fn get(&mut self, key: &[u8]) -> TmemResult<Vec<u8>> {
        let req = GetRequest::new(key.as_ptr() as usize, key.len(), 0, 0, 0);
        let len = self.handle.submit_get(req, key)?;
        Ok(self.handle.scratch()[..len].to_vec())
    }

    pub fn invalidate(&self, key: &[u8]) -> TmemResult<()> {
        let req = InvalRequest::new(key.as_ptr() as usize, key.len(), 0);
        self.handle.submit_invalidate(req, key)
    }

    pub fn invalidate_all(&self) -> TmemResult<()> {
        self.handle.invalidate_all()
    }

    pub fn control(&self, bits: u64) -> TmemResult<()> {
        self.handle.control(bits)
    }

    pub fn set_generate_size(&self, value: u64) -> TmemResult<()> {
        self.handle.generate_size(value)
    }
}
