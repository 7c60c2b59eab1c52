//! Deterministic test payloads.
//!
//! Word `i` of every payload is the `i`-th triangular number, so both ends of
//! a connection can rebuild the expected bytes locally instead of sending them.

pub const WORD_BYTES: usize = core::mem::size_of::<u64>();

/// Number of 64-bit words needed to carry `byte_size` bytes.
pub fn word_count(byte_size: usize) -> usize {
    byte_size.div_ceil(WORD_BYTES)
}

/// `i * (i + 1) / 2`
///
/// The product of two consecutive integers is even, so the shift is exact
/// even after wrapping.
pub fn triangular(i: u64) -> u64 {
    i.wrapping_mul(i.wrapping_add(1)) >> 1
}

pub fn generate(byte_size: usize) -> Vec<u64> {
    generate_at(0, word_count(byte_size))
}

/// Expected words of a slice that starts at word `start` of a larger buffer.
pub fn generate_at(start: u64, len: usize) -> Vec<u64> {
    (start..).take(len).map(triangular).collect()
}

pub fn matches_at(words: &[u64], start: u64) -> bool {
    words
        .iter()
        .zip(start..)
        .all(|(&word, i)| word == triangular(i))
}
