use std::time::Duration;

use bytes::BytesMut;
use common::{
    payload::WORD_BYTES,
    wire::{decode_words_into, encode_words_into},
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::trial::TransportMode;

use super::{TransportError, WordTransport, timed};

/// Ordered, reliable byte stream carrying back-to-back big-endian words.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
    write_buf: BytesMut,
    read_buf: Vec<u8>,
    recv_timeout: Option<Duration>,
}
impl<S> StreamTransport<S> {
    pub fn new(stream: S, recv_timeout: Option<Duration>) -> Self {
        Self {
            stream,
            write_buf: BytesMut::new(),
            read_buf: Vec::new(),
            recv_timeout,
        }
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
impl<S> StreamTransport<S>
where
    S: AsyncWrite + Unpin,
{
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
impl<S> WordTransport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn mode(&self) -> TransportMode {
        TransportMode::Stream
    }

    async fn send_words(&mut self, words: &[u64]) -> Result<(), TransportError> {
        self.write_buf.clear();
        encode_words_into(words, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        trace!(words = words.len(), "Sent words");
        Ok(())
    }

    async fn recv_words(&mut self, words: &mut [u64]) -> Result<(), TransportError> {
        self.read_buf.resize(words.len() * WORD_BYTES, 0);
        timed(
            self.recv_timeout,
            self.stream.read_exact(&mut self.read_buf),
        )
        .await?;
        decode_words_into(&self.read_buf, words)?;
        trace!(words = words.len(), "Received words");
        Ok(())
    }

    async fn send_status(&mut self, status: u64) -> Result<(), TransportError> {
        self.stream.write_u64(status).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn recv_status(&mut self) -> Result<u64, TransportError> {
        timed(self.recv_timeout, self.stream.read_u64()).await
    }
}
