use std::ops::Range;

use thiserror::Error;

use crate::payload::WORD_BYTES;

/// Bytes masked under one key value before the key is advanced.
pub const ROTATION_QUOTA: u32 = 64;

/// XOR mask whose key evolves with the number of bytes it has masked.
///
/// Both ends stay in lockstep as long as they mask the same number of words
/// in the same order. The key can only change through [`Self::advance`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeystreamCipher {
    key: u64,
    bytes_since_rotation: u32,
    rotation_quota: u32,
}
impl KeystreamCipher {
    pub fn new(key: u64) -> Self {
        Self {
            key,
            bytes_since_rotation: 0,
            rotation_quota: ROTATION_QUOTA,
        }
    }

    pub fn with_quota(key: u64, rotation_quota: u32) -> Result<Self, KeystreamError> {
        if rotation_quota == 0 || !(rotation_quota as usize).is_multiple_of(WORD_BYTES) {
            return Err(KeystreamError::Quota(rotation_quota));
        }
        Ok(Self {
            key,
            bytes_since_rotation: 0,
            rotation_quota,
        })
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn bytes_since_rotation(&self) -> u32 {
        self.bytes_since_rotation
    }

    pub fn rotation_quota(&self) -> u32 {
        self.rotation_quota
    }

    /// XOR `words[range]` with the keystream.
    ///
    /// # Panics
    ///
    /// If `range` is out of bounds of `words`.
    pub fn mask_range(&mut self, words: &mut [u64], range: Range<usize>) {
        for word in &mut words[range] {
            *word ^= self.key;
            self.bytes_since_rotation += WORD_BYTES as u32;
            if self.bytes_since_rotation >= self.rotation_quota {
                self.advance();
                self.bytes_since_rotation = 0;
            }
        }
    }

    pub fn mask(&mut self, words: &mut [u64]) {
        let len = words.len();
        self.mask_range(words, 0..len);
    }

    pub fn advance(&mut self) {
        self.key = xorshift(self.key);
    }
}

pub fn xorshift(mut key: u64) -> u64 {
    key ^= key << 13;
    key ^= key >> 7;
    key ^= key << 17;
    key
}

#[derive(Debug, Error)]
pub enum KeystreamError {
    #[error("Rotation quota must be a positive multiple of {WORD_BYTES} bytes, got {0}")]
    Quota(u32),
}
