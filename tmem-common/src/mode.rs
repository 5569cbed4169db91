//! # Mode Register
//!
//! Process-wide behavior switches. Each bit independently toggles a
//! diagnostic or benchmarking behavior; they compose (e.g. `SLEEPY |
//! SILENT` both apply). Mirrors the `TCTRL_*` bit tests in the original
//! ioctl dispatcher, but as a `bitflags`-shaped small integer type rather
//! than raw `arg & MASK` tests scattered through a match arm.

use std::sync::atomic::{AtomicU64, Ordering};

/// Skip the backend entirely; PUT/INVALIDATE succeed unconditionally and
/// GET reports a zero-length value without copying anything out.
pub const DUMMY: u64 = 1 << 0;

/// GET still queries the backend but the copy-out is suppressed; the
/// caller observes a zero-length result regardless of what was found.
pub const SILENT: u64 = 1 << 1;

/// Sleep `SLEEP_USECS` (jittered) before dispatching the call.
pub const SLEEPY: u64 = 1 << 2;

/// GET fabricates a response of `GenerateSize` bytes from the scratch
/// buffer's existing contents instead of querying the backend.
pub const GENERATE: u64 = 1 << 3;

const ALL_BITS: u64 = DUMMY | SILENT | SLEEPY | GENERATE;

/// A validated combination of mode bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModeBits(u64);

impl ModeBits {
    pub const NONE: ModeBits = ModeBits(0);

    /// Builds a `ModeBits` from a raw bitset, rejecting unknown bits.
    pub fn from_bits(bits: u64) -> Option<Self> {
        if bits & !ALL_BITS == 0 {
            Some(ModeBits(bits))
        } else {
            None
        }
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, bit: u64) -> bool {
        self.0 & bit != 0
    }

    pub fn dummy(self) -> bool {
        self.contains(DUMMY)
    }

    pub fn silent(self) -> bool {
        self.contains(SILENT)
    }

    pub fn sleepy(self) -> bool {
        self.contains(SLEEPY)
    }

    pub fn generate(self) -> bool {
        self.contains(GENERATE)
    }
}

/// The process-wide mode register. `CONTROL` commands mutate it; any
/// per-call `flags` field, if non-zero, overrides it for that call only
/// without touching the stored value.
#[derive(Debug, Default)]
pub struct ModeRegister {
    bits: AtomicU64,
}

impl ModeRegister {
    pub fn new() -> Self {
        ModeRegister { bits: AtomicU64::new(0) }
    }

    /// Replaces the register wholesale, matching the original's behavior of
    /// deriving the new state from `arg & (all known bits)` on every
    /// `CONTROL` call rather than accumulating toggles.
    pub fn set(&self, mode: ModeBits) {
        self.bits.store(mode.bits(), Ordering::SeqCst);
    }

    pub fn get(&self) -> ModeBits {
        ModeBits(self.bits.load(Ordering::SeqCst))
    }

    /// Resolves the effective mode for one call: a non-zero per-call
    /// override entirely replaces the stored register for that call,
    /// per the request plane's redesigned per-call `flags` semantics.
    pub fn effective(&self, per_call: Option<ModeBits>) -> ModeBits {
        match per_call {
            Some(bits) if !bits.is_empty() => bits,
            _ => self.get(),
        }
    }
}

/// The process-wide `GENERATE` response length, meaningful only while the
/// `GENERATE` bit is set.
#[derive(Debug, Default)]
pub struct GenerateSize {
    value: AtomicU64,
}

impl GenerateSize {
    pub fn new() -> Self {
        GenerateSize { value: AtomicU64::new(0) }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::SeqCst);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}
