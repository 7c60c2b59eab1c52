use std::{io, net::SocketAddr};

use anyhow::Context;
use protocol::{
    session::{SessionSummary, run_server_session},
    transport::DatagramTransport,
};
use tokio::net::{TcpListener, UdpSocket};
use tracing::{error, info, instrument};

use crate::config::BenchConfig;

/// Both sockets share one port number.
#[derive(Debug)]
pub struct Listeners {
    tcp: TcpListener,
    udp: UdpSocket,
}
impl Listeners {
    /// Binds the datagram socket before any stream connection is accepted.
    pub async fn bind(listen_addr: SocketAddr) -> io::Result<Self> {
        let tcp = TcpListener::bind(listen_addr)
            .await
            .inspect_err(|e| error!(?e, "Failed to bind to listen address"))?;
        let udp = UdpSocket::bind(tcp.local_addr()?)
            .await
            .inspect_err(|e| error!(?e, "Failed to bind datagram socket"))?;
        Ok(Self { tcp, udp })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    pub fn into_parts(self) -> (TcpListener, UdpSocket) {
        (self.tcp, self.udp)
    }
}

/// Accept one client and answer its whole session.
#[instrument(skip_all)]
pub async fn serve_one(
    listeners: Listeners,
    config: &BenchConfig,
) -> anyhow::Result<SessionSummary> {
    let (tcp, udp) = listeners.into_parts();
    info!(addr = ?tcp.local_addr().ok(), "Waiting for client");
    let (stream, peer) = tcp.accept().await.context("Failed to accept client")?;
    drop(tcp);
    info!(?peer, "Client connected");

    let datagram = DatagramTransport::accepting(udp, config.datagram_timeout());
    let plan = config.plan();
    let options = config.session_options();
    let summary = run_server_session(&plan, &options, stream, datagram).await?;
    Ok(summary)
}
