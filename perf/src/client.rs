use std::net::SocketAddr;

use anyhow::Context;
use common::addr::any_addr;
use protocol::{
    session::{SessionSummary, run_client_session},
    transport::DatagramTransport,
};
use tokio::net::{TcpStream, UdpSocket};
use tracing::{info, instrument, warn};

use crate::{config::BenchConfig, report::ReportSink};

/// Run every trial against the responder at `server_addr` and write the results.
#[instrument(skip(config))]
pub async fn run_client(
    server_addr: SocketAddr,
    config: &BenchConfig,
) -> anyhow::Result<SessionSummary> {
    let stream = TcpStream::connect(server_addr)
        .await
        .with_context(|| format!("Failed to connect to {server_addr}"))?;
    let socket = UdpSocket::bind(any_addr(&server_addr.ip()))
        .await
        .context("Failed to bind datagram socket")?;
    let datagram = DatagramTransport::to_peer(socket, server_addr, config.datagram_timeout());
    info!(local = ?datagram.local_addr().ok(), "Connected");

    let mut sink = ReportSink::create(&config.log_file, &config.output_dir)
        .context("Failed to open result files")?;
    let res = run_client_session(
        &config.plan(),
        &config.session_options(),
        stream,
        datagram,
        &mut sink,
    )
    .await;
    sink.flush().context("Failed to flush result files")?;
    let summary = res?;

    if !summary.echo_matched {
        warn!("Responder echoed a different handshake; samples are likely invalid");
    }
    Ok(summary)
}
