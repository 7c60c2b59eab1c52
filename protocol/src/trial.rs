use std::{fmt, time::Duration};

use common::{
    log::SampleRecord,
    payload::{WORD_BYTES, word_count},
    wire::MAX_DATAGRAM_WORDS,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportMode {
    Stream,
    Datagram,
}
impl TransportMode {
    pub const ALL: [TransportMode; 2] = [TransportMode::Stream, TransportMode::Datagram];

    pub fn label(&self) -> &'static str {
        match self {
            TransportMode::Stream => "tcp",
            TransportMode::Datagram => "udp",
        }
    }
}
impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    Rtt,
    Throughput,
}
impl MeasurementKind {
    pub fn label(&self) -> &'static str {
        match self {
            MeasurementKind::Rtt => "rtt",
            MeasurementKind::Throughput => "throughput",
        }
    }
}
impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One cell of the trial matrix.
///
/// RTT trials always have `message_count == 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrialSpec {
    pub kind: MeasurementKind,
    pub transport_mode: TransportMode,
    pub message_size: usize,
    pub message_count: usize,
    pub sample_count: usize,
}
impl TrialSpec {
    pub fn rtt(transport_mode: TransportMode, message_size: usize, sample_count: usize) -> Self {
        Self {
            kind: MeasurementKind::Rtt,
            transport_mode,
            message_size,
            message_count: 1,
            sample_count,
        }
    }

    pub fn throughput(
        transport_mode: TransportMode,
        load: ThroughputLoad,
        sample_count: usize,
    ) -> Self {
        Self {
            kind: MeasurementKind::Throughput,
            transport_mode,
            message_size: load.message_size,
            message_count: load.messages,
            sample_count,
        }
    }

    /// Words per message, rounding a partial trailing word up.
    pub fn words_per_message(&self) -> usize {
        word_count(self.message_size)
    }

    /// Payload bytes one sample moves in the client-to-responder direction.
    pub fn total_bytes(&self) -> u64 {
        self.message_count as u64 * self.message_size as u64
    }

    /// Human-readable trial boundary line.
    pub fn headline(&self) -> String {
        match self.kind {
            MeasurementKind::Rtt => format!(
                "RTT to send {} Bytes over {}:",
                self.message_size, self.transport_mode
            ),
            MeasurementKind::Throughput => format!(
                "Throughput of {} messages of {} Bytes over {}:",
                self.message_count, self.message_size, self.transport_mode
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThroughputLoad {
    pub messages: usize,
    pub message_size: usize,
}

/// One measurement. `index` counts from 1 within its trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub index: usize,
    pub elapsed: Duration,
    pub valid: bool,
}
impl Sample {
    /// Nanoseconds for RTT trials, bits per second for throughput trials.
    pub fn metric(&self, spec: &TrialSpec) -> f64 {
        match spec.kind {
            MeasurementKind::Rtt => self.elapsed.as_nanos() as f64,
            MeasurementKind::Throughput => throughput_bps(spec.total_bytes(), self.elapsed),
        }
    }

    pub fn record(&self, spec: &TrialSpec) -> SampleRecord {
        SampleRecord {
            msg_bytes: spec.message_size as u64,
            msg_count: spec.message_count as u64,
            sample: self.index as u64,
            metric: self.metric(spec),
            valid: u8::from(self.valid),
        }
    }
}

/// An elapsed time below the clock resolution counts as one nanosecond.
pub fn throughput_bps(total_bytes: u64, elapsed: Duration) -> f64 {
    let elapsed = elapsed.max(Duration::from_nanos(1));
    total_bytes as f64 / elapsed.as_secs_f64() * 8.0
}

/// The fixed matrix both parties walk through in the same order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialPlan {
    pub sample_count: usize,
    pub rtt_sizes: Vec<usize>,
    pub throughput: Vec<ThroughputLoad>,
}
impl Default for TrialPlan {
    fn default() -> Self {
        Self {
            sample_count: 30,
            rtt_sizes: vec![8, 64, 512],
            throughput: vec![
                ThroughputLoad {
                    messages: 16384,
                    message_size: 64,
                },
                ThroughputLoad {
                    messages: 4096,
                    message_size: 256,
                },
                ThroughputLoad {
                    messages: 1024,
                    message_size: 1024,
                },
            ],
        }
    }
}
impl TrialPlan {
    /// RTT trials in size order, then throughput trials in load order.
    pub fn trials(&self, mode: TransportMode) -> Vec<TrialSpec> {
        let rtt = self
            .rtt_sizes
            .iter()
            .map(|&size| TrialSpec::rtt(mode, size, self.sample_count));
        let throughput = self
            .throughput
            .iter()
            .map(|&load| TrialSpec::throughput(mode, load, self.sample_count));
        rtt.chain(throughput).collect()
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.sample_count == 0 {
            return Err(PlanError::NoSamples);
        }
        let sizes = self
            .rtt_sizes
            .iter()
            .copied()
            .chain(self.throughput.iter().map(|load| load.message_size));
        for size in sizes {
            if size == 0 {
                return Err(PlanError::EmptyMessage);
            }
            if word_count(size) > MAX_DATAGRAM_WORDS {
                return Err(PlanError::MessageTooLarge {
                    size,
                    max: MAX_DATAGRAM_WORDS * WORD_BYTES,
                });
            }
        }
        if self.throughput.iter().any(|load| load.messages == 0) {
            return Err(PlanError::NoMessages);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Sample count must be positive")]
    NoSamples,
    #[error("Message size must be positive")]
    EmptyMessage,
    #[error("Message count must be positive")]
    NoMessages,
    #[error("Message size {size} exceeds the datagram limit of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_of_one_mebibyte_per_second() {
        let spec = TrialSpec::throughput(
            TransportMode::Stream,
            ThroughputLoad {
                messages: 1024,
                message_size: 1024,
            },
            1,
        );
        let bps = throughput_bps(spec.total_bytes(), Duration::from_secs(1));
        assert_eq!(bps, 8_388_608.0);

        let sample = Sample {
            index: 1,
            elapsed: Duration::from_secs(1),
            valid: true,
        };
        assert_eq!(sample.metric(&spec), 8_388_608.0);
    }

    #[test]
    fn zero_elapsed_stays_finite() {
        let bps = throughput_bps(1024, Duration::ZERO);
        assert!(bps.is_finite());
        assert_eq!(bps, throughput_bps(1024, Duration::from_nanos(1)));
    }

    #[test]
    fn rtt_metric_is_nanoseconds() {
        let spec = TrialSpec::rtt(TransportMode::Datagram, 8, 1);
        let sample = Sample {
            index: 3,
            elapsed: Duration::from_micros(250),
            valid: false,
        };
        let record = sample.record(&spec);
        assert_eq!(record.metric, 250_000.0);
        assert_eq!(record.sample, 3);
        assert_eq!(record.msg_count, 1);
        assert_eq!(record.valid, 0);
    }

    #[test]
    fn default_plan_order() {
        let plan = TrialPlan::default();
        plan.validate().unwrap();
        let trials = plan.trials(TransportMode::Stream);
        let cells = trials
            .iter()
            .map(|t| (t.kind, t.message_count, t.message_size))
            .collect::<Vec<_>>();
        assert_eq!(
            cells,
            vec![
                (MeasurementKind::Rtt, 1, 8),
                (MeasurementKind::Rtt, 1, 64),
                (MeasurementKind::Rtt, 1, 512),
                (MeasurementKind::Throughput, 16384, 64),
                (MeasurementKind::Throughput, 4096, 256),
                (MeasurementKind::Throughput, 1024, 1024),
            ]
        );
        assert!(trials.iter().all(|t| t.sample_count == 30));
        assert!(
            trials
                .iter()
                .all(|t| t.transport_mode == TransportMode::Stream)
        );
    }

    #[test]
    fn words_per_message_rounds_up() {
        let spec = TrialSpec::rtt(TransportMode::Stream, 10, 1);
        assert_eq!(spec.words_per_message(), 2);
    }

    #[test]
    fn rejects_degenerate_plans() {
        let mut plan = TrialPlan::default();
        plan.rtt_sizes.push(0);
        assert!(matches!(plan.validate(), Err(PlanError::EmptyMessage)));

        let mut plan = TrialPlan::default();
        plan.rtt_sizes = vec![70_000];
        assert!(matches!(
            plan.validate(),
            Err(PlanError::MessageTooLarge { .. })
        ));

        // Just above the IPv4 UDP payload ceiling
        let mut plan = TrialPlan::default();
        plan.rtt_sizes = vec![65_528];
        assert!(matches!(
            plan.validate(),
            Err(PlanError::MessageTooLarge { max: 65_504, .. })
        ));
        plan.rtt_sizes = vec![65_504];
        plan.validate().unwrap();

        let plan = TrialPlan {
            sample_count: 0,
            ..Default::default()
        };
        assert!(matches!(plan.validate(), Err(PlanError::NoSamples)));
    }

    #[test]
    fn load_from_json() {
        let load: ThroughputLoad =
            serde_json::from_str(r#"{"messages": 4096, "message_size": 256}"#).unwrap();
        assert_eq!(
            load,
            ThroughputLoad {
                messages: 4096,
                message_size: 256
            }
        );
        let mode: TransportMode = serde_json::from_str(r#""datagram""#).unwrap();
        assert_eq!(mode, TransportMode::Datagram);
    }
}
