use std::{
    future::Future,
    time::{Duration, Instant},
};

use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

use crate::{
    Candidate, Error, Java, JavaResponse,
    packet::{NEXT_STATE_STATUS, Packet, read_packet},
    resolve::resolve,
    tokio::{AsyncPingable, resolver},
};

/// Fields of the handshake that opens a status exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: i32,
    pub server_host: String,
    pub server_port: u16,
}

/// Why a single candidate could not be probed, by the step that failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("could not connect: {0}")]
    DialFailed(#[source] Error),
    #[error("sending the handshake failed: {0}")]
    HandshakeFailed(#[source] Error),
    #[error("reading the status response failed: {0}")]
    ReadFailed(#[source] Error),
    #[error("the status document was invalid: {0}")]
    ParseFailed(#[source] serde_json::Error),
    #[error("the ping exchange failed: {0}")]
    PingFailed(#[source] Error),
    #[error("pong carried {received}, expected {sent}")]
    PongMismatch { sent: i64, received: i64 },
}

/// A successful probe of one of the candidates.
#[derive(Debug)]
pub struct Probed {
    pub candidate: Candidate,
    pub status: JavaResponse,
    pub latency: Duration,
    /// Candidates tried (and failed) before this one.
    pub failures: Vec<(Candidate, ProbeError)>,
}

/// Every candidate failed.
#[derive(Debug, Error)]
#[error("all {} candidates failed", .failures.len())]
pub struct Exhausted {
    pub failures: Vec<(Candidate, ProbeError)>,
}

async fn bounded<T>(
    timeout: Option<Duration>,
    step: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, step)
            .await
            .map_err(|_| Error::TimedOut)?,
        None => step.await,
    }
}

/// Open a TCP connection to `candidate`.
///
/// # Errors
/// [`ProbeError::DialFailed`] on refusal, name resolution failure or timeout.
pub async fn dial(candidate: &Candidate, timeout: Option<Duration>) -> Result<TcpStream, ProbeError> {
    let connect = async { Ok(TcpStream::connect((candidate.host.as_str(), candidate.port)).await?) };
    bounded(timeout, connect).await.map_err(ProbeError::DialFailed)
}

/// Run the status exchange over an already open connection.
///
/// Steps run strictly in order and the first failure ends the exchange: the
/// handshake and status request, the status response, then a ping whose token
/// must come back unchanged. `timeout` bounds each step separately.
///
/// The returned latency covers only the ping round trip.
///
/// # Errors
/// A [`ProbeError`] naming the step that failed.
pub async fn probe<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    handshake: &Handshake,
    timeout: Option<Duration>,
) -> Result<(JavaResponse, Duration), ProbeError> {
    let hello = Packet::Handshake {
        version: handshake.protocol_version,
        host: handshake.server_host.clone(),
        port: handshake.server_port,
        next_state: NEXT_STATE_STATUS,
    };
    bounded(timeout, hello.send(stream))
        .await
        .map_err(ProbeError::HandshakeFailed)?;
    bounded(timeout, Packet::Request.send(stream))
        .await
        .map_err(ProbeError::HandshakeFailed)?;

    let document = bounded(timeout, read_packet(stream))
        .await
        .and_then(|raw| raw.status_document())
        .map_err(ProbeError::ReadFailed)?;
    let status = JavaResponse::from_json(&document).map_err(ProbeError::ParseFailed)?;

    // The token only has to be unpredictable enough to catch a stale or
    // foreign pong; the latency itself is taken from a monotonic clock.
    let token: i64 = rand::random();
    let started = Instant::now();
    bounded(timeout, Packet::Ping { payload: token }.send(stream))
        .await
        .map_err(ProbeError::PingFailed)?;
    let echoed = bounded(timeout, read_packet(stream))
        .await
        .and_then(|raw| raw.ping_token())
        .map_err(ProbeError::PingFailed)?;
    let latency = started.elapsed();

    if echoed != token {
        return Err(ProbeError::PongMismatch {
            sent: token,
            received: echoed,
        });
    }
    Ok((status, latency))
}

async fn probe_candidate(
    candidate: &Candidate,
    protocol_version: i32,
    timeout: Option<Duration>,
) -> Result<(JavaResponse, Duration), ProbeError> {
    let mut stream = dial(candidate, timeout).await?;
    let server_port = stream
        .peer_addr()
        .map_err(|error| ProbeError::DialFailed(error.into()))?
        .port();
    let handshake = Handshake {
        protocol_version,
        server_host: candidate.host.clone(),
        server_port,
    };
    probe(&mut stream, &handshake, timeout).await
}

/// Try `candidates` in order on fresh connections and stop at the first one
/// that completes the whole exchange.
///
/// # Errors
/// [`Exhausted`] with one failure per candidate if none succeeded.
pub async fn probe_first_reachable(
    candidates: &[Candidate],
    protocol_version: i32,
    timeout: Option<Duration>,
) -> Result<Probed, Exhausted> {
    let mut failures = Vec::new();
    for candidate in candidates {
        match probe_candidate(candidate, protocol_version, timeout).await {
            Ok((status, latency)) => {
                return Ok(Probed {
                    candidate: candidate.clone(),
                    status,
                    latency,
                    failures,
                });
            }
            Err(error) => {
                tracing::debug!(%candidate, %error, "candidate failed");
                failures.push((candidate.clone(), error));
            }
        }
    }
    Err(Exhausted { failures })
}

impl AsyncPingable for Java {
    type Response = JavaResponse;

    async fn ping(self) -> Result<(Duration, Self::Response), Error> {
        let candidates = resolve(&self.server_address, resolver()).await?;
        let probed = probe_first_reachable(&candidates, self.protocol_version, self.timeout).await?;
        Ok((probed.latency, probed.status))
    }
}
