//! One full benchmark run per side: handshake, then every trial over the
//! stream transport, then every trial over the datagram transport.
//!
//! The keystream carries over from the stream phase into the datagram phase
//! on both sides.

use common::error::AnyError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{error, info, instrument};

use crate::{
    handshake::{HandshakeError, HandshakeOptions, client_handshake, server_handshake},
    harness::Harness,
    responder::{Responder, ResponderReport},
    transport::{StreamTransport, TransportError, WordTransport},
    trial::{PlanError, Sample, TransportMode, TrialPlan, TrialSpec},
};

/// What the driver does when a trial hits a transport failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// End the run
    #[default]
    Abort,
    /// Log and continue with the next trial
    SkipTrial,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub handshake: HandshakeOptions,
    pub failure_policy: FailurePolicy,
}

/// Receives trial results in trial order.
pub trait TrialSink {
    fn trial_started(&mut self, spec: &TrialSpec) -> Result<(), AnyError>;
    fn trial_finished(&mut self, spec: &TrialSpec, samples: &[Sample]) -> Result<(), AnyError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub echo_matched: bool,
    pub completed: usize,
    pub failed: Vec<TrialSpec>,
}

#[instrument(skip_all)]
pub async fn run_client_session<Stream, Datagram, Sink>(
    plan: &TrialPlan,
    options: &SessionOptions,
    mut stream: Stream,
    mut datagram: Datagram,
    sink: &mut Sink,
) -> Result<SessionSummary, SessionError>
where
    Stream: AsyncRead + AsyncWrite + Unpin + Send,
    Datagram: WordTransport,
    Sink: TrialSink,
{
    plan.validate()?;
    let handshake = client_handshake(&mut stream, &options.handshake).await?;
    let mut summary = SessionSummary {
        echo_matched: handshake.echo_matched,
        ..Default::default()
    };
    let mut harness = Harness::new(handshake.cipher);

    let mut stream = StreamTransport::new(stream, None);
    drive_client(&mut harness, &mut stream, plan, options, sink, &mut summary).await?;
    stream.shutdown().await?;

    drive_client(
        &mut harness,
        &mut datagram,
        plan,
        options,
        sink,
        &mut summary,
    )
    .await?;
    info!(
        completed = summary.completed,
        failed = summary.failed.len(),
        "Client session done"
    );
    Ok(summary)
}

async fn drive_client<Transport, Sink>(
    harness: &mut Harness,
    transport: &mut Transport,
    plan: &TrialPlan,
    options: &SessionOptions,
    sink: &mut Sink,
    summary: &mut SessionSummary,
) -> Result<(), SessionError>
where
    Transport: WordTransport,
    Sink: TrialSink,
{
    for spec in plan.trials(transport.mode()) {
        sink.trial_started(&spec).map_err(SessionError::Sink)?;
        match harness.run(transport, &spec).await {
            Ok(samples) => {
                sink.trial_finished(&spec, &samples)
                    .map_err(SessionError::Sink)?;
                summary.completed += 1;
            }
            Err(e) => handle_failure(options.failure_policy, spec, e, summary)?,
        }
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn run_server_session<Stream, Datagram>(
    plan: &TrialPlan,
    options: &SessionOptions,
    mut stream: Stream,
    mut datagram: Datagram,
) -> Result<SessionSummary, SessionError>
where
    Stream: AsyncRead + AsyncWrite + Unpin + Send,
    Datagram: WordTransport,
{
    plan.validate()?;
    let handshake = server_handshake(&mut stream, options.handshake.rotation_quota).await?;
    let mut summary = SessionSummary {
        echo_matched: handshake.echo_matched,
        ..Default::default()
    };
    let mut responder = Responder::new(handshake.cipher);

    let mut stream = StreamTransport::new(stream, None);
    drive_server(&mut responder, &mut stream, plan, options, &mut summary).await?;
    // The client may already have closed its end
    let _ = stream.shutdown().await;

    drive_server(&mut responder, &mut datagram, plan, options, &mut summary).await?;
    info!(
        completed = summary.completed,
        failed = summary.failed.len(),
        "Server session done"
    );
    Ok(summary)
}

async fn drive_server<Transport>(
    responder: &mut Responder,
    transport: &mut Transport,
    plan: &TrialPlan,
    options: &SessionOptions,
    summary: &mut SessionSummary,
) -> Result<(), SessionError>
where
    Transport: WordTransport,
{
    for spec in plan.trials(transport.mode()) {
        match responder.serve(transport, &spec).await {
            Ok(ResponderReport { messages, invalid }) => {
                info!(
                    kind = %spec.kind,
                    mode = %spec.transport_mode,
                    size = spec.message_size,
                    messages,
                    invalid,
                    "Trial served"
                );
                summary.completed += 1;
            }
            Err(e) => handle_failure(options.failure_policy, spec, e, summary)?,
        }
    }
    Ok(())
}

fn handle_failure(
    policy: FailurePolicy,
    spec: TrialSpec,
    e: TransportError,
    summary: &mut SessionSummary,
) -> Result<(), SessionError> {
    match policy {
        FailurePolicy::Abort => Err(SessionError::Trial {
            source: e,
            kind: spec.kind.label(),
            mode: spec.transport_mode,
            size: spec.message_size,
        }),
        FailurePolicy::SkipTrial => {
            error!(?e, ?spec, "Trial failed; skipping");
            summary.failed.push(spec);
            Ok(())
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid trial plan: {0}")]
    Plan(#[from] PlanError),
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),
    #[error("{kind} trial of {size} bytes over {mode} failed: {source}")]
    Trial {
        #[source]
        source: TransportError,
        kind: &'static str,
        mode: TransportMode,
        size: usize,
    },
    #[error("Transport failure between phases: {0}")]
    Transport(#[from] TransportError),
    #[error("Failed to record results: {0}")]
    Sink(#[source] AnyError),
}
