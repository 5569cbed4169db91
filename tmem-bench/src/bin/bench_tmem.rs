//! # Backend Benchmark Harness
//!
//! Purpose: a dependency-free, repeatable benchmark driver for the backend
//! dispatch layer, so baseline PUT/GET throughput can be compared across
//! backends and over time. Pre-built key/value buffers and a small
//! deterministic PRNG keep allocation off the timed hot path; each op calls
//! the concrete backend through the `TmemBackend` trait object exactly
//! once, the same cost the request plane itself would pay.
//!
//! ## Design Principles
//! 1. **Deterministic workload** — fixed PRNG seeds for stable comparisons.
//! 2. **Allocation control** — keys/values are pre-built, off the hot path.
//! 3. **Direct dispatch** — calls the concrete backend through the trait
//!    object once per op, same cost the request plane itself would pay.

use std::env;
use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tmem_backend::remote::IdentityAddressTranslator;
use tmem_backend::{LocalBackend, NullBackend, PointerBackend, RemoteBackend, SleepBackend, TmemBackend};
use tmem_client::LoopbackTransport;
use tmem_common::TmemResult;

const DEFAULT_KEY_COUNT: usize = 1 << 14;
const DEFAULT_OP_COUNT: usize = 200_000;
const DEFAULT_KEY_SIZE: usize = 16;
const DEFAULT_VALUE_SIZE: usize = 128;

struct BenchConfig {
    requested_keys: usize,
    key_count: usize,
    key_mask: usize,
    op_count: usize,
    key_size: usize,
    value_size: usize,
    backend_name: String,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let backend_name = args.next().unwrap_or_else(|| "local".to_string());
        let requested_keys = parse_usize(args.next(), DEFAULT_KEY_COUNT);
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT);
        let key_size = parse_usize(args.next(), DEFAULT_KEY_SIZE);
        let value_size = parse_usize(args.next(), DEFAULT_VALUE_SIZE);

        let key_count = normalize_power_of_two(requested_keys);
        let key_mask = key_count - 1;

        BenchConfig { requested_keys, key_count, key_mask, op_count, key_size, value_size, backend_name }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

fn normalize_power_of_two(value: usize) -> usize {
    let value = value.max(1);
    if value.is_power_of_two() {
        value
    } else {
        value.next_power_of_two()
    }
}

/// Tiny deterministic PRNG used to avoid external dependencies.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, mask: usize) -> usize {
        (self.next_u64() as usize) & mask
    }
}

fn write_u64_le(value: u64, buffer: &mut [u8]) {
    let bytes = value.to_le_bytes();
    let copy_len = buffer.len().min(bytes.len());
    buffer[..copy_len].copy_from_slice(&bytes[..copy_len]);
}

fn build_buffers(count: usize, size: usize, seed: u64) -> Vec<Vec<u8>> {
    let mut buffers = Vec::with_capacity(count);
    for i in 0..count {
        let mut buffer = vec![0u8; size];
        write_u64_le(seed ^ (i as u64), &mut buffer);
        buffers.push(buffer);
    }
    buffers
}

fn report(label: &str, ops: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let nanos_per_op = (secs * 1e9) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {nanos_per_op:.1} ns/op)");
}

fn build_backend(name: &str) -> Arc<dyn TmemBackend> {
    match name {
        "local" => Arc::new(LocalBackend::new()),
        "pointer" => Arc::new(PointerBackend::new()),
        "null" => Arc::new(NullBackend::new()),
        "sleep" => Arc::new(SleepBackend::new()),
        "remote" => {
            Arc::new(RemoteBackend::new(Box::new(LoopbackTransport::new()), Box::new(IdentityAddressTranslator)))
        }
        other => {
            eprintln!("unknown backend '{other}', falling back to 'local'");
            Arc::new(LocalBackend::new())
        }
    }
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();
    if let Err(err) = run() {
        eprintln!("bench_tmem failed: {err}");
        std::process::exit(1);
    }
}

fn run() -> TmemResult<()> {
    let config = BenchConfig::from_args();
    let backend = build_backend(&config.backend_name);

    let keys = build_buffers(config.key_count, config.key_size, 0xA5A5_A5A5_A5A5_A5A5);
    let values = build_buffers(config.key_count, config.value_size, 0x5A5A_5A5A_5A5A_5A5A);

    for idx in 0..config.key_count {
        backend.put(&keys[idx], &values[idx])?;
    }

    println!(
        "backend={}, keys: requested={}, actual={}, ops={}, key_size={}, value_size={}",
        config.backend_name, config.requested_keys, config.key_count, config.op_count, config.key_size, config.value_size
    );

    let mut scratch = vec![0u8; config.value_size];
    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        let len = backend.get(&keys[idx], &mut scratch).unwrap_or(0);
        black_box(len);
    }
    report("GET", config.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask);
        let mut value = values[idx].clone();
        if let Some(first) = value.get_mut(0) {
            *first ^= 0xFF;
        }
        backend.put(&keys[idx], &value)?;
    }
    report("PUT", config.op_count, start.elapsed());

    Ok(())
}
