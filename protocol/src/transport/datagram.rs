use std::{io, net::SocketAddr, time::Duration};

use bytes::BytesMut;
use common::wire::{MAX_DATAGRAM_WORDS, decode_words_into, encode_words_into};
use tokio::net::UdpSocket;
use tracing::{trace, warn};

use crate::trial::TransportMode;

use super::{TransportError, WordTransport, timed};

const RECV_BUFFER_LENGTH: usize = 1 << 16;

/// One message per datagram.
///
/// No retransmission and no reordering: a datagram lost on either leg
/// blocks the receiver until `recv_timeout` fires, or forever without one.
#[derive(Debug)]
pub struct DatagramTransport {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    learn_peer: bool,
    write_buf: BytesMut,
    read_buf: Box<[u8]>,
    recv_timeout: Option<Duration>,
}
impl DatagramTransport {
    /// Client side: every datagram goes to `peer`.
    pub fn to_peer(socket: UdpSocket, peer: SocketAddr, recv_timeout: Option<Duration>) -> Self {
        Self::new(socket, Some(peer), false, recv_timeout)
    }

    /// Responder side: replies go to whoever sent the last datagram.
    pub fn accepting(socket: UdpSocket, recv_timeout: Option<Duration>) -> Self {
        Self::new(socket, None, true, recv_timeout)
    }

    fn new(
        socket: UdpSocket,
        peer: Option<SocketAddr>,
        learn_peer: bool,
        recv_timeout: Option<Duration>,
    ) -> Self {
        Self {
            socket,
            peer,
            learn_peer,
            write_buf: BytesMut::new(),
            read_buf: vec![0; RECV_BUFFER_LENGTH].into(),
            recv_timeout,
        }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    async fn send_datagram(&mut self) -> Result<(), TransportError> {
        let peer = self.peer.ok_or(TransportError::NoPeer)?;
        self.socket.send_to(&self.write_buf, peer).await?;
        Ok(())
    }

    /// Receive one datagram and return its length.
    ///
    /// With a fixed peer, datagrams from any other sender are dropped.
    async fn recv_datagram(&mut self) -> Result<usize, TransportError> {
        let fixed_peer = if self.learn_peer { None } else { self.peer };
        let socket = &self.socket;
        let read_buf = &mut self.read_buf;
        let (n, addr) = timed(self.recv_timeout, async {
            loop {
                let (n, addr) = socket.recv_from(&mut read_buf[..]).await?;
                match fixed_peer {
                    Some(peer) if peer != addr => {
                        warn!(?addr, ?peer, "Dropped datagram from unexpected sender");
                    }
                    _ => return Ok::<_, io::Error>((n, addr)),
                }
            }
        })
        .await?;
        if self.learn_peer {
            if self.peer.is_some_and(|peer| peer != addr) {
                warn!(?addr, peer = ?self.peer, "Datagram peer changed");
            }
            self.peer = Some(addr);
        }
        Ok(n)
    }
}
impl WordTransport for DatagramTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Datagram
    }

    async fn send_words(&mut self, words: &[u64]) -> Result<(), TransportError> {
        if words.len() > MAX_DATAGRAM_WORDS {
            return Err(TransportError::DatagramTooLarge { words: words.len() });
        }
        self.write_buf.clear();
        encode_words_into(words, &mut self.write_buf);
        self.send_datagram().await?;
        trace!(words = words.len(), "Sent datagram");
        Ok(())
    }

    async fn recv_words(&mut self, words: &mut [u64]) -> Result<(), TransportError> {
        let n = self.recv_datagram().await?;
        decode_words_into(&self.read_buf[..n], words)?;
        trace!(words = words.len(), "Received datagram");
        Ok(())
    }

    async fn send_status(&mut self, status: u64) -> Result<(), TransportError> {
        self.write_buf.clear();
        encode_words_into(&[status], &mut self.write_buf);
        self.send_datagram().await
    }

    async fn recv_status(&mut self) -> Result<u64, TransportError> {
        let n = self.recv_datagram().await?;
        let mut status = [0; 1];
        decode_words_into(&self.read_buf[..n], &mut status)?;
        Ok(status[0])
    }
}
