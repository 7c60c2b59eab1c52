use common::{keystream::KeystreamCipher, payload, wire::STATUS_OK};
use tracing::{instrument, trace, warn};

use crate::{
    transport::{TransportError, WordTransport},
    trial::{MeasurementKind, TrialSpec},
};

/// Tally of what the responder saw during one trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponderReport {
    pub messages: usize,
    pub invalid: usize,
}

/// Server role: decodes, validates, and echoes or acknowledges.
#[derive(Debug)]
pub struct Responder {
    cipher: KeystreamCipher,
}
impl Responder {
    pub fn new(cipher: KeystreamCipher) -> Self {
        Self { cipher }
    }

    pub fn cipher(&self) -> &KeystreamCipher {
        &self.cipher
    }

    pub async fn serve<Transport>(
        &mut self,
        transport: &mut Transport,
        spec: &TrialSpec,
    ) -> Result<ResponderReport, TransportError>
    where
        Transport: WordTransport,
    {
        match spec.kind {
            MeasurementKind::Rtt => self.serve_rtt(transport, spec).await,
            MeasurementKind::Throughput => self.serve_throughput(transport, spec).await,
        }
    }

    /// Echo the decoded message back under fresh keystream.
    #[instrument(skip_all, fields(size = spec.message_size, mode = %spec.transport_mode))]
    pub async fn serve_rtt<Transport>(
        &mut self,
        transport: &mut Transport,
        spec: &TrialSpec,
    ) -> Result<ResponderReport, TransportError>
    where
        Transport: WordTransport,
    {
        let expected = payload::generate(spec.message_size);
        let mut message = vec![0; expected.len()];
        let mut report = ResponderReport::default();
        for index in 1..=spec.sample_count {
            transport.recv_words(&mut message).await?;
            self.cipher.mask(&mut message);
            let valid = message == expected;
            if !valid {
                warn!(index, "Received message does not match");
                report.invalid += 1;
            }
            trace!(index, valid, "RTT message");
            report.messages += 1;

            self.cipher.mask(&mut message);
            transport.send_words(&message).await?;
        }
        Ok(report)
    }

    /// Validate each message by its position in the sender's buffer, then acknowledge.
    #[instrument(skip_all, fields(
        messages = spec.message_count,
        size = spec.message_size,
        mode = %spec.transport_mode,
    ))]
    pub async fn serve_throughput<Transport>(
        &mut self,
        transport: &mut Transport,
        spec: &TrialSpec,
    ) -> Result<ResponderReport, TransportError>
    where
        Transport: WordTransport,
    {
        let words_per_message = spec.words_per_message();
        let mut message = vec![0; words_per_message];
        let mut report = ResponderReport::default();
        for index in 1..=spec.sample_count {
            for position in 0..spec.message_count {
                transport.recv_words(&mut message).await?;
                self.cipher.mask(&mut message);
                let start = (position * words_per_message) as u64;
                if !payload::matches_at(&message, start) {
                    warn!(index, position, "Received message does not match");
                    report.invalid += 1;
                }
                report.messages += 1;
                transport.send_status(STATUS_OK).await?;
            }
        }
        Ok(report)
    }
}
