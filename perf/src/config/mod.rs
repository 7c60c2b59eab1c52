use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use common::keystream::ROTATION_QUOTA;
use protocol::{
    handshake::{DEFAULT_ITERATION_COUNT, HandshakeOptions},
    session::{FailurePolicy, SessionOptions},
    trial::{ThroughputLoad, TrialPlan},
};
use serde::Deserialize;
use thiserror::Error;

pub mod toml;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 26910;

/// Settings both parties must agree on, plus where the client writes results.
///
/// The trial matrix, iteration count and rotation quota have to be the same
/// on both sides or the keystreams drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    pub sample_count: usize,
    pub rtt_sizes: Vec<usize>,
    pub throughput: Vec<ThroughputLoad>,
    pub iteration_count: u32,
    pub rotation_quota: u32,
    pub strict_handshake: bool,
    pub failure_policy: FailurePolicy,
    /// Unset: a lost datagram blocks forever
    pub datagram_timeout_ms: Option<u64>,
    pub log_file: PathBuf,
    pub output_dir: PathBuf,
}
impl Default for BenchConfig {
    fn default() -> Self {
        let plan = TrialPlan::default();
        Self {
            sample_count: plan.sample_count,
            rtt_sizes: plan.rtt_sizes,
            throughput: plan.throughput,
            iteration_count: DEFAULT_ITERATION_COUNT,
            rotation_quota: ROTATION_QUOTA,
            strict_handshake: false,
            failure_policy: FailurePolicy::Abort,
            datagram_timeout_ms: None,
            log_file: PathBuf::from("log.txt"),
            output_dir: PathBuf::from("."),
        }
    }
}
impl BenchConfig {
    pub fn plan(&self) -> TrialPlan {
        TrialPlan {
            sample_count: self.sample_count,
            rtt_sizes: self.rtt_sizes.clone(),
            throughput: self.throughput.clone(),
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            handshake: HandshakeOptions {
                iteration_count: self.iteration_count,
                rotation_quota: self.rotation_quota,
                strict: self.strict_handshake,
            },
            failure_policy: self.failure_policy,
        }
    }

    pub fn datagram_timeout(&self) -> Option<Duration> {
        self.datagram_timeout_ms.map(Duration::from_millis)
    }
}

pub async fn read_config(path: &Path) -> Result<BenchConfig, ConfigError> {
    let src = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Read {
            source: e,
            path: path.to_owned(),
        })?;
    let path = path.display().to_string();
    ::toml::from_str(&src)
        .map_err(|e| ConfigError::Parse(toml::human_toml_error(&path, &src, e)))
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {source}, {path:?}")]
    Read {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
    #[error("{0}")]
    Parse(String),
}
