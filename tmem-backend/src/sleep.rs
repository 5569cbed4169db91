//! # Sleep Backend
//!
//! Grounded on `tmem_sleep.c`: every call delays by a fixed duration before
//! behaving exactly like the Null backend, simulating a slow remote store
//! for throughput and latency-bucket benchmarking. The original used
//! `mdelay(SLEEP)` (`SLEEP = 10` ms, busy-wait); a blocking
//! `std::thread::sleep` is the right equivalent off an interrupt context.

use std::thread;
use std::time::Duration;

use tmem_common::{TmemConfig, TmemResult, SLEEP_USECS};

use crate::backend::TmemBackend;

pub struct SleepBackend {
    delay: Duration,
}

impl SleepBackend {
    pub fn new() -> Self {
        SleepBackend { delay: Duration::from_micros(SLEEP_USECS) }
    }

    pub fn with_config(config: TmemConfig) -> Self {
        SleepBackend { delay: config.sleepy_delay() }
    }

    pub fn with_delay(delay: Duration) -> Self {
        SleepBackend { delay }
    }
}

impl Default for SleepBackend {
    fn default() -> Self {
        SleepBackend::new()
    }
}

impl TmemBackend for SleepBackend {
    fn put(&self, _key: &[u8], _value: &[u8]) -> TmemResult<()> {
        thread::sleep(self.delay);
        Ok(())
    }

    fn get(&self, _key: &[u8], _out: &mut [u8]) -> TmemResult<usize> {
        thread::sleep(self.delay);
        Ok(0)
    }

    fn invalidate(&self, _key: &[u8]) {
        thread::sleep(self.delay);
    }

    fn invalidate_all(&self) {
        thread::sleep(self.delay);
    }

    fn name(&self) -> &'static str {
        "sleep"
    }
}
