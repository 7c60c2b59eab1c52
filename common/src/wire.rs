use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use crate::payload::WORD_BYTES;

/// Acknowledgment sent unmasked after every throughput message.
pub const STATUS_OK: u64 = 200;

/// Largest UDP payload over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Largest message that still fits in one UDP datagram.
pub const MAX_DATAGRAM_WORDS: usize = MAX_UDP_PAYLOAD / WORD_BYTES;
const _: () = assert!(MAX_DATAGRAM_WORDS * WORD_BYTES <= MAX_UDP_PAYLOAD);

pub fn encode_words(words: &[u64]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(words.len() * WORD_BYTES);
    encode_words_into(words, &mut buf);
    buf
}

pub fn encode_words_into(words: &[u64], buf: &mut BytesMut) {
    buf.reserve(words.len() * WORD_BYTES);
    for &word in words {
        buf.put_u64(word);
    }
}

pub fn decode_words(buf: &[u8]) -> Result<Vec<u64>, WireError> {
    if !buf.len().is_multiple_of(WORD_BYTES) {
        return Err(WireError::Unaligned { len: buf.len() });
    }
    let mut words = vec![0; buf.len() / WORD_BYTES];
    decode_words_into(buf, &mut words)?;
    Ok(words)
}

/// Decode exactly `out.len()` words.
pub fn decode_words_into(mut buf: &[u8], out: &mut [u64]) -> Result<(), WireError> {
    let expected = out.len() * WORD_BYTES;
    if buf.len() != expected {
        return Err(WireError::Length {
            expected,
            actual: buf.len(),
        });
    }
    for word in out.iter_mut() {
        *word = buf.get_u64();
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("Buffer length {len} is not a multiple of {WORD_BYTES}")]
    Unaligned { len: usize },
    #[error("Expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}
