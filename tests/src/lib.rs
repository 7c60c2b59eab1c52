use std::path::PathBuf;

mod bench;
mod handshake;

/// Fresh directory under the system temp dir for one test's artifacts.
pub fn temp_output_dir() -> PathBuf {
    std::env::temp_dir().join(format!("xorperf-test-{:016x}", rand::random::<u64>()))
}
