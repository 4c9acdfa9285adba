#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
//! `pyng` is a Rust crate that implements the Minecraft Java edition status
//! ping. It can be used to ask a server for its status document (MOTD, player
//! counts, version) and to measure the round-trip latency of the connection.
//!
//! Addresses are resolved the way the vanilla client does it: an explicit port
//! always wins, otherwise a `_minecraft._tcp` SRV lookup is attempted, and the
//! default port is used as the last resort. All I/O runs on tokio.
//!
//! The main API surface is [`tokio::get_status`] for one-shot pings and
//! [`tokio::probe_first_reachable`] for callers that manage resolution
//! themselves.

pub mod packet;
pub mod resolve;
pub mod tokio;
pub mod varint;

mod java;

pub use java::{Chat, DEFAULT_PROTOCOL_VERSION, Java, JavaResponse, Player, Players, Version};
pub use resolve::{Candidate, DEFAULT_PORT, SrvLookup, resolve};
pub use crate::tokio::{Exhausted, ProbeError, Probed};

/// Errors that can occur while encoding, framing or resolving.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("VarInt did not terminate within {0} bytes")]
    MalformedVarint(usize),
    #[error("buffer ended before the value was complete")]
    TruncatedRead,
    #[error("connection closed before the packet was complete")]
    ConnectionClosed,
    #[error("declared packet length {0} exceeds the protocol maximum")]
    OversizedPacket(usize),
    #[error("length field was negative: {0}")]
    InvalidLength(i32),
    #[error("expected packet id {expected:#04x}, got {got:#04x}")]
    UnexpectedPacket { expected: i32, got: i32 },
    #[error("string was not valid UTF-8: {0}")]
    InvalidString(#[from] std::string::FromUtf8Error),
    #[error("an I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),
    #[error("a JSON error occurred: {0}")]
    JsonErr(#[from] serde_json::Error),
    #[error("an invalid address was provided")]
    InvalidAddress,
    #[error("DNS lookup for the host provided failed")]
    DnsLookupFailed,
    #[error("the operation timed out")]
    TimedOut,
    #[error("no candidate address answered: {0}")]
    Unreachable(#[from] Exhausted),
}
