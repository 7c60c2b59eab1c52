//! Agree on the initial keystream key without sending it.
//!
//! The client sends a random seed and a warm-up iteration count, the
//! responder echoes both, and each side derives the key locally from them.

use std::io;

use common::keystream::{KeystreamCipher, KeystreamError, ROTATION_QUOTA};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, instrument, warn};

pub const DEFAULT_ITERATION_COUNT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeOptions {
    pub iteration_count: u32,
    pub rotation_quota: u32,
    /// Fail on an echo mismatch instead of logging it
    pub strict: bool,
}
impl Default for HandshakeOptions {
    fn default() -> Self {
        Self {
            iteration_count: DEFAULT_ITERATION_COUNT,
            rotation_quota: ROTATION_QUOTA,
            strict: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Handshake {
    pub seed: u64,
    pub iteration_count: u32,
    /// Always `true` on the responder, which echoes whatever it reads
    pub echo_matched: bool,
    pub cipher: KeystreamCipher,
}

/// Seed a PRNG with `seed`, drop `iteration_count` outputs, take the next.
pub fn derive_initial_key(seed: u64, iteration_count: u32) -> u64 {
    let mut rng = StdRng::seed_from_u64(seed);
    for _ in 0..iteration_count {
        rng.next_u64();
    }
    rng.next_u64()
}

pub async fn client_handshake<Stream>(
    stream: &mut Stream,
    options: &HandshakeOptions,
) -> Result<Handshake, HandshakeError>
where
    Stream: AsyncRead + AsyncWrite + Unpin,
{
    let seed = rand::random();
    client_handshake_with_seed(stream, seed, options).await
}

#[instrument(skip(stream, options))]
pub async fn client_handshake_with_seed<Stream>(
    stream: &mut Stream,
    seed: u64,
    options: &HandshakeOptions,
) -> Result<Handshake, HandshakeError>
where
    Stream: AsyncRead + AsyncWrite + Unpin,
{
    let iteration_count = i32::try_from(options.iteration_count)
        .map_err(|_| HandshakeError::IterationCount(i64::from(options.iteration_count)))?;

    stream.write_i64(seed as i64).await?;
    stream.flush().await?;
    let seed_echo = stream.read_i64().await? as u64;

    stream.write_i32(iteration_count).await?;
    stream.flush().await?;
    let iteration_echo = stream.read_i32().await?;

    let echo_matched = seed_echo == seed && iteration_echo == iteration_count;
    if echo_matched {
        info!("Key is valid");
    } else if options.strict {
        return Err(HandshakeError::EchoMismatch {
            seed,
            seed_echo,
            iteration_count,
            iteration_echo,
        });
    } else {
        warn!(
            seed,
            seed_echo, iteration_count, iteration_echo, "Handshake echo mismatch; continuing"
        );
    }

    let key = derive_initial_key(seed, options.iteration_count);
    let cipher = KeystreamCipher::with_quota(key, options.rotation_quota)?;
    Ok(Handshake {
        seed,
        iteration_count: options.iteration_count,
        echo_matched,
        cipher,
    })
}

#[instrument(skip(stream))]
pub async fn server_handshake<Stream>(
    stream: &mut Stream,
    rotation_quota: u32,
) -> Result<Handshake, HandshakeError>
where
    Stream: AsyncRead + AsyncWrite + Unpin,
{
    let seed = stream.read_i64().await?;
    stream.write_i64(seed).await?;
    stream.flush().await?;

    let iteration_count = stream.read_i32().await?;
    stream.write_i32(iteration_count).await?;
    stream.flush().await?;

    let iteration_count = u32::try_from(iteration_count)
        .map_err(|_| HandshakeError::IterationCount(i64::from(iteration_count)))?;
    let seed = seed as u64;
    let key = derive_initial_key(seed, iteration_count);
    let cipher = KeystreamCipher::with_quota(key, rotation_quota)?;
    info!(iteration_count, "Handshake done");
    Ok(Handshake {
        seed,
        iteration_count,
        echo_matched: true,
        cipher,
    })
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid iteration count: {0}")]
    IterationCount(i64),
    #[error(
        "Echo mismatch: seed {seed:#x} echoed as {seed_echo:#x}, iteration count {iteration_count} echoed as {iteration_echo}"
    )]
    EchoMismatch {
        seed: u64,
        seed_echo: u64,
        iteration_count: i32,
        iteration_echo: i32,
    },
    #[error("Keystream error: {0}")]
    Keystream(#[from] KeystreamError),
}
