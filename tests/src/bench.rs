#[cfg(test)]
mod tests {
    use std::{
        fs,
        net::{Ipv4Addr, SocketAddr},
        path::Path,
    };

    use perf::{
        client::run_client,
        config::{BenchConfig, DEFAULT_PORT},
        report::ReportSink,
        server::{Listeners, serve_one},
    };
    use protocol::{
        session::SessionSummary,
        trial::{MeasurementKind, ThroughputLoad, TransportMode},
    };
    use serial_test::serial;
    use tokio::task::JoinHandle;

    use crate::temp_output_dir;

    fn small_config(output_dir: &Path) -> BenchConfig {
        BenchConfig {
            sample_count: 4,
            rtt_sizes: vec![8, 13, 512],
            throughput: vec![
                ThroughputLoad {
                    messages: 64,
                    message_size: 64,
                },
                ThroughputLoad {
                    messages: 8,
                    message_size: 1024,
                },
            ],
            datagram_timeout_ms: Some(2_000),
            log_file: output_dir.join("log.txt"),
            output_dir: output_dir.to_owned(),
            ..Default::default()
        }
    }

    async fn spawn_server(
        listen_addr: SocketAddr,
        config: BenchConfig,
    ) -> (SocketAddr, JoinHandle<SessionSummary>) {
        let listeners = Listeners::bind(listen_addr).await.unwrap();
        let addr = listeners.local_addr().unwrap();
        let handle = tokio::spawn(async move { serve_one(listeners, &config).await.unwrap() });
        (addr, handle)
    }

    fn csv_rows(output_dir: &Path, kind: MeasurementKind, mode: TransportMode) -> Vec<String> {
        let path = ReportSink::csv_path(output_dir, kind, mode);
        let text = fs::read_to_string(path).unwrap();
        text.lines().skip(1).map(str::to_owned).collect()
    }

    async fn run_and_check(listen_addr: SocketAddr) {
        let output_dir = temp_output_dir();
        let config = small_config(&output_dir);
        let (server_addr, server) = spawn_server(listen_addr, config.clone()).await;
        let server_addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), server_addr.port());

        let summary = run_client(server_addr, &config).await.unwrap();
        let server_summary = server.await.unwrap();

        assert!(summary.echo_matched);
        assert_eq!(summary.completed, 10);
        assert!(summary.failed.is_empty());
        assert_eq!(server_summary.completed, 10);

        for mode in TransportMode::ALL {
            let rtt = csv_rows(&output_dir, MeasurementKind::Rtt, mode);
            assert_eq!(rtt.len(), 3 * 4);
            assert!(rtt[0].starts_with("8,1,1,"), "{rtt:?}");
            assert!(rtt.iter().all(|row| row.ends_with(",1")), "{rtt:?}");
            let thruput = csv_rows(&output_dir, MeasurementKind::Throughput, mode);
            assert_eq!(thruput.len(), 2 * 4);
            assert!(thruput[0].starts_with("64,64,1,"), "{thruput:?}");
            assert!(thruput.iter().all(|row| row.ends_with(",1")), "{thruput:?}");
        }

        let log = fs::read_to_string(output_dir.join("log.txt")).unwrap();
        assert!(log.starts_with("RTT to send 8 Bytes over tcp:\n"));
        assert!(log.contains("Throughput of 8 messages of 1024 Bytes over udp:\n"));
        assert!(!log.contains("(invalid)"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn loopback_session() {
        run_and_check("127.0.0.1:0".parse().unwrap()).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn default_port_session() {
        run_and_check(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), DEFAULT_PORT)).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn log_file_appends_across_runs() {
        let output_dir = temp_output_dir();
        let config = BenchConfig {
            sample_count: 1,
            rtt_sizes: vec![8],
            throughput: vec![],
            ..small_config(&output_dir)
        };
        for _ in 0..2 {
            let (server_addr, server) =
                spawn_server("127.0.0.1:0".parse().unwrap(), config.clone()).await;
            run_client(server_addr, &config).await.unwrap();
            server.await.unwrap();
        }

        let log = fs::read_to_string(output_dir.join("log.txt")).unwrap();
        assert_eq!(log.matches("RTT to send 8 Bytes over tcp:").count(), 2);
        // CSV files are rewritten per run
        let rows = csv_rows(&output_dir, MeasurementKind::Rtt, TransportMode::Datagram);
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_responder() {
        let output_dir = temp_output_dir();
        let config = small_config(&output_dir);
        // Nothing listens on a freshly released port
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let err = run_client(addr, &config).await.unwrap_err();
        assert!(err.to_string().contains("Failed to connect"));
    }
}
