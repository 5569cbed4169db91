//! # Null Backend
//!
//! Grounded on `tmem_dummy.c`: every call succeeds unconditionally, `get`
//! always reports a miss via a zero-length result. Useful for measuring the
//! request plane's own overhead independent of any real storage.

use tmem_common::TmemResult;

use crate::backend::TmemBackend;

#[derive(Default)]
pub struct NullBackend;

impl NullBackend {
    pub fn new() -> Self {
        NullBackend
    }
}

impl TmemBackend for NullBackend {
    fn put(&self, _key: &[u8], _value: &[u8]) -> TmemResult<()> {
        Ok(())
    }

    fn get(&self, _key: &[u8], _out: &mut [u8]) -> TmemResult<usize> {
        Ok(0)
    }

    fn invalidate(&self, _key: &[u8]) {}

    fn invalidate_all(&self) {}

    fn name(&self) -> &'static str {
        "null"
    }
}
