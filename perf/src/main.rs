use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use common::addr::resolve;
use perf::{
    client::run_client,
    config::{BenchConfig, DEFAULT_HOST, DEFAULT_PORT, read_config},
    server::{Listeners, serve_one},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Round-trip time and throughput benchmark over TCP and UDP
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML file with the trial plan and output settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    role: Role,
}

#[derive(Debug, Subcommand)]
enum Role {
    /// Drive the trials and record the results
    Client {
        #[arg(default_value = DEFAULT_HOST)]
        host: String,
        #[arg(default_value_t = DEFAULT_PORT)]
        port: u16,
        sample_count: Option<usize>,
    },
    /// Answer a single client session
    Server {
        #[arg(default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Must match the client's sample count
        sample_count: Option<usize>,
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
        bind: IpAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .with_line_number(true)
        .init();

    let args = Cli::parse();
    let mut config = match &args.config {
        Some(path) => read_config(path).await?,
        None => BenchConfig::default(),
    };

    match args.role {
        Role::Client {
            host,
            port,
            sample_count,
        } => {
            if let Some(sample_count) = sample_count {
                config.sample_count = sample_count;
            }
            let server_addr = resolve(&host, port)
                .await
                .with_context(|| format!("Failed to resolve {host}"))?;
            let summary = run_client(server_addr, &config).await?;
            info!(
                completed = summary.completed,
                failed = summary.failed.len(),
                "Benchmark finished"
            );
        }
        Role::Server {
            port,
            sample_count,
            bind,
        } => {
            if let Some(sample_count) = sample_count {
                config.sample_count = sample_count;
            }
            let listeners = Listeners::bind(SocketAddr::new(bind, port)).await?;
            let summary = serve_one(listeners, &config).await?;
            info!(
                completed = summary.completed,
                failed = summary.failed.len(),
                "Session served"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_defaults() {
        let cli = Cli::parse_from(["xorperf", "client"]);
        assert!(cli.config.is_none());
        match cli.role {
            Role::Client {
                host,
                port,
                sample_count,
            } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 26910);
                assert_eq!(sample_count, None);
            }
            Role::Server { .. } => panic!("expected client"),
        }
    }

    #[test]
    fn positional_overrides() {
        let cli = Cli::parse_from([
            "xorperf",
            "client",
            "bench.local",
            "9000",
            "12",
            "-c",
            "a.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
        match cli.role {
            Role::Client {
                host,
                port,
                sample_count,
            } => {
                assert_eq!(host, "bench.local");
                assert_eq!(port, 9000);
                assert_eq!(sample_count, Some(12));
            }
            Role::Server { .. } => panic!("expected client"),
        }
    }

    #[test]
    fn server_bind() {
        let cli = Cli::parse_from(["xorperf", "server", "7000", "--bind", "127.0.0.1"]);
        match cli.role {
            Role::Server { port, bind, .. } => {
                assert_eq!(port, 7000);
                assert_eq!(bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
            }
            Role::Client { .. } => panic!("expected server"),
        }
    }
}
