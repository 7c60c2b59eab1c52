#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, time::Duration};

    use common::keystream::KeystreamCipher;
    use perf::{client::run_client, config::BenchConfig, server::Listeners};
    use protocol::{
        handshake::derive_initial_key,
        responder::Responder,
        transport::{DatagramTransport, StreamTransport, TransportError},
        trial::TransportMode,
    };
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        task::JoinHandle,
    };

    use crate::temp_output_dir;

    fn config() -> BenchConfig {
        let output_dir = temp_output_dir();
        BenchConfig {
            sample_count: 2,
            rtt_sizes: vec![8, 100],
            throughput: vec![],
            datagram_timeout_ms: Some(2_000),
            log_file: output_dir.join("log.txt"),
            output_dir,
            ..Default::default()
        }
    }

    /// Echoes a seed with one bit flipped, then serves the plan keyed off
    /// the seed it actually received.
    async fn spawn_corrupting_server(
        config: BenchConfig,
    ) -> (SocketAddr, JoinHandle<Result<(), TransportError>>) {
        let listeners = Listeners::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = listeners.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (tcp, udp) = listeners.into_parts();
            let (mut stream, _) = tcp.accept().await.unwrap();
            let seed = stream.read_i64().await.unwrap();
            stream.write_i64(seed ^ 1).await.unwrap();
            let iteration_count = stream.read_i32().await.unwrap();
            stream.write_i32(iteration_count).await.unwrap();

            let key = derive_initial_key(seed as u64, iteration_count as u32);
            let mut responder = Responder::new(KeystreamCipher::new(key));
            let plan = config.plan();
            let mut stream = StreamTransport::new(stream, None);
            for spec in plan.trials(TransportMode::Stream) {
                let report = responder.serve(&mut stream, &spec).await?;
                assert_eq!(report.invalid, 0);
            }
            let mut datagram = DatagramTransport::accepting(udp, config.datagram_timeout());
            for spec in plan.trials(TransportMode::Datagram) {
                let report = responder.serve(&mut datagram, &spec).await?;
                assert_eq!(report.invalid, 0);
            }
            Ok(())
        });
        (addr, handle)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn echo_mismatch_is_flagged() {
        let config = config();
        let (addr, server) = spawn_corrupting_server(config.clone()).await;
        let summary = run_client(addr, &config).await.unwrap();
        server.await.unwrap().unwrap();

        assert!(!summary.echo_matched);
        assert_eq!(summary.completed, 4);
        let log = std::fs::read_to_string(&config.log_file).unwrap();
        assert!(!log.contains("(invalid)"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn strict_client_refuses_mismatch() {
        let config = BenchConfig {
            strict_handshake: true,
            ..config()
        };
        let (addr, server) = spawn_corrupting_server(config.clone()).await;
        let err = tokio::time::timeout(Duration::from_secs(5), run_client(addr, &config))
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().contains("Handshake failed"), "{err:#}");
        // The client hung up before the first trial
        assert!(server.await.unwrap().is_err());
    }
}
