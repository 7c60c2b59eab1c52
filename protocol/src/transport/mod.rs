use std::{io, time::Duration};

use common::wire::WireError;
use thiserror::Error;

use crate::trial::TransportMode;

pub mod datagram;
pub mod stream;

pub use datagram::DatagramTransport;
pub use stream::StreamTransport;

/// Moves whole messages of 64-bit words between the two parties.
///
/// Words are written as given; masking is the caller's concern.
pub trait WordTransport {
    fn mode(&self) -> TransportMode;

    fn send_words(
        &mut self,
        words: &[u64],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Fill `words` with exactly one message of `words.len()` words.
    fn recv_words(
        &mut self,
        words: &mut [u64],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn send_status(
        &mut self,
        status: u64,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn recv_status(&mut self) -> impl Future<Output = Result<u64, TransportError>> + Send;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Codec error: {0}")]
    Wire(#[from] WireError),
    #[error("Datagram of {words} words exceeds the datagram size limit")]
    DatagramTooLarge { words: usize },
    #[error("No peer address to send to")]
    NoPeer,
}

/// Await `io` for at most `timeout`; `None` waits forever.
async fn timed<T>(
    timeout: Option<Duration>,
    io: impl Future<Output = io::Result<T>>,
) -> Result<T, TransportError> {
    let Some(timeout) = timeout else {
        return Ok(io.await?);
    };
    match tokio::time::timeout(timeout, io).await {
        Ok(res) => Ok(res?),
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}
