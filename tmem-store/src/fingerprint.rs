//! # Fingerprinting
//!
//! Turns an arbitrary caller-supplied key into an owned, word-aligned copy
//! plus a cheap hash for bucket selection.
//!
//! ## WHY the zero-padding
//!
//! The original device driver copies the key into a buffer at least
//! `size_of::<usize>()` bytes wide and zero-fills the tail when the key is
//! shorter than a machine word, then reinterprets the first word as the
//! hash. Doing the same here keeps single-byte and other sub-word keys
//! hashable without a variable-width hash function, and keeps the hash
//! computation a single load instead of a byte-by-byte fold.
//!
//! ## WHY the hash is not the match
//!
//! The hash only selects a shard/bucket. Two distinct keys that share their
//! leading word (e.g. `"a"` and `"ab"`, both zero-padded) hash identically;
//! `Store` always falls back to comparing the full, unpadded key bytes with
//! exact-length equality before considering two entries the same key. That
//! full-length comparison is what fixes the source driver's prefix-collision
//! bug, where `memcmp` over only `min(stored_len, query_len)` bytes let a
//! shorter key match as a prefix of a longer one.

use std::mem::size_of;

/// Owned key bytes plus the hash derived from their zero-padded prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// The original, unpadded key bytes — this is what equality compares.
    key: Vec<u8>,
    /// First machine word of the zero-padded key, used only to pick a
    /// bucket. Never used for equality.
    hash: u64,
}

impl Fingerprint {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn into_key(self) -> Vec<u8> {
        self.key
    }
}

/// Computes a [`Fingerprint`] for `bytes`, matching the original driver's
/// `get_key()` zero-padding and word-reinterpretation exactly.
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    let word = size_of::<usize>();
    let padded_len = bytes.len().max(word);
    let mut padded = vec![0u8; padded_len];
    padded[..bytes.len()].copy_from_slice(bytes);

    let mut word_bytes = [0u8; size_of::<usize>()];
    word_bytes.copy_from_slice(&padded[..word]);
    let hash = usize::from_ne_bytes(word_bytes) as u64;

    Fingerprint { key: bytes.to_vec(), hash }
}
