use std::time::Instant;

use common::{keystream::KeystreamCipher, payload, wire::STATUS_OK};
use tracing::{debug, instrument, warn};

use crate::{
    transport::{TransportError, WordTransport},
    trial::{MeasurementKind, Sample, TrialSpec},
};

/// Client role: sends masked payloads and times the responses.
#[derive(Debug)]
pub struct Harness {
    cipher: KeystreamCipher,
}
impl Harness {
    pub fn new(cipher: KeystreamCipher) -> Self {
        Self { cipher }
    }

    pub fn cipher(&self) -> &KeystreamCipher {
        &self.cipher
    }

    pub async fn run<Transport>(
        &mut self,
        transport: &mut Transport,
        spec: &TrialSpec,
    ) -> Result<Vec<Sample>, TransportError>
    where
        Transport: WordTransport,
    {
        match spec.kind {
            MeasurementKind::Rtt => self.run_rtt(transport, spec).await,
            MeasurementKind::Throughput => self.run_throughput(transport, spec).await,
        }
    }

    #[instrument(skip_all, fields(size = spec.message_size, mode = %spec.transport_mode))]
    pub async fn run_rtt<Transport>(
        &mut self,
        transport: &mut Transport,
        spec: &TrialSpec,
    ) -> Result<Vec<Sample>, TransportError>
    where
        Transport: WordTransport,
    {
        let expected = payload::generate(spec.message_size);
        let mut response = vec![0; expected.len()];
        let mut samples = Vec::with_capacity(spec.sample_count);
        for index in 1..=spec.sample_count {
            let mut message = payload::generate(spec.message_size);
            self.cipher.mask(&mut message);

            let start = Instant::now();
            transport.send_words(&message).await?;
            transport.recv_words(&mut response).await?;
            self.cipher.mask(&mut response);
            let elapsed = start.elapsed();

            let valid = response == expected;
            if !valid {
                warn!(index, "Echoed message does not match");
            }
            debug!(index, ?elapsed, valid, "RTT sample");
            samples.push(Sample {
                index,
                elapsed,
                valid,
            });
        }
        Ok(samples)
    }

    /// Each message waits for its acknowledgment before the next is sent.
    #[instrument(skip_all, fields(
        messages = spec.message_count,
        size = spec.message_size,
        mode = %spec.transport_mode,
    ))]
    pub async fn run_throughput<Transport>(
        &mut self,
        transport: &mut Transport,
        spec: &TrialSpec,
    ) -> Result<Vec<Sample>, TransportError>
    where
        Transport: WordTransport,
    {
        let words_per_message = spec.words_per_message();
        let pristine = payload::generate_at(0, words_per_message * spec.message_count);
        let mut samples = Vec::with_capacity(spec.sample_count);
        for index in 1..=spec.sample_count {
            let mut buffer = pristine.clone();
            let mut valid = true;

            let start = Instant::now();
            for message in 0..spec.message_count {
                let range = message * words_per_message..(message + 1) * words_per_message;
                self.cipher.mask_range(&mut buffer, range.clone());
                transport.send_words(&buffer[range]).await?;
                let status = transport.recv_status().await?;
                if status != STATUS_OK {
                    warn!(index, message, status, "Unexpected acknowledgment");
                    valid = false;
                }
            }
            let elapsed = start.elapsed();

            debug!(index, ?elapsed, valid, "Throughput sample");
            samples.push(Sample {
                index,
                elapsed,
                valid,
            });
        }
        Ok(samples)
    }
}
