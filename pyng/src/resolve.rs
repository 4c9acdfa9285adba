//! Turning a user supplied server address into dialable candidates.
//!
//! The order of precedence matches the vanilla client:
//! 1. an explicit `host:port` is used as-is, without any lookup;
//! 2. otherwise every `_minecraft._tcp.<host>` SRV record is a candidate, in
//!    the order the resolver returned them;
//! 3. otherwise `<host>:25565`.

use std::{
    fmt::{Display, Formatter},
    future::Future,
    net::{IpAddr, SocketAddr},
};

use crate::Error;

/// The default port of a Java edition server.
pub const DEFAULT_PORT: u16 = 25565;

/// One `(host, port)` pair worth dialing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub host: String,
    pub port: u16,
}

impl Candidate {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Display for Candidate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Something that can answer SRV queries.
///
/// Implemented for the hickory resolver in [`crate::tokio`]; tests substitute
/// canned answers.
pub trait SrvLookup {
    /// Look up the SRV records for `name`, returning their targets in the
    /// order received. An empty list means no records exist.
    fn lookup_srv(&self, name: &str) -> impl Future<Output = Result<Vec<Candidate>, Error>> + Send;
}

impl<T: SrvLookup + Sync> SrvLookup for &T {
    fn lookup_srv(&self, name: &str) -> impl Future<Output = Result<Vec<Candidate>, Error>> + Send {
        (**self).lookup_srv(name)
    }
}

/// SRV name under which Java servers are advertised for `host`.
#[must_use]
pub fn srv_name(host: &str) -> String {
    format!("_minecraft._tcp.{host}")
}

/// Split an explicit port off `target`, if it has one.
///
/// # Errors
/// [`Error::InvalidAddress`] when a port is present but is not a valid `u16`,
/// or the host part is empty.
pub fn split_explicit_port(target: &str) -> Result<Option<Candidate>, Error> {
    if let Ok(socket) = target.parse::<SocketAddr>() {
        return Ok(Some(Candidate::new(socket.ip().to_string(), socket.port())));
    }
    // A bare IPv6 literal is full of colons but carries no port.
    if target.parse::<IpAddr>().is_ok() {
        return Ok(None);
    }
    let Some((host, port)) = target.rsplit_once(':') else {
        return Ok(None);
    };
    if host.is_empty() || host.contains(':') {
        return Err(Error::InvalidAddress);
    }
    let port = port.parse().map_err(|_| Error::InvalidAddress)?;
    Ok(Some(Candidate::new(host, port)))
}

/// Resolve `target` (`host` or `host:port`) into an ordered candidate list.
///
/// Every target without an explicit port is looked up, IP literals included.
/// SRV lookup failures are not errors: they only mean the default port is used.
///
/// # Errors
/// [`Error::InvalidAddress`] for an empty target or an unparsable port.
pub async fn resolve<L: SrvLookup + Sync>(target: &str, lookup: &L) -> Result<Vec<Candidate>, Error> {
    let target = target.trim();
    if target.is_empty() {
        return Err(Error::InvalidAddress);
    }
    if let Some(explicit) = split_explicit_port(target)? {
        return Ok(vec![explicit]);
    }
    match lookup.lookup_srv(&srv_name(target)).await {
        Ok(records) if !records.is_empty() => {
            tracing::debug!(address = target, count = records.len(), "using SRV records");
            return Ok(records);
        }
        Ok(_) => tracing::trace!(address = target, "no SRV records"),
        Err(error) => tracing::debug!(address = target, ?error, "SRV lookup failed, using default port"),
    }
    Ok(vec![Candidate::new(target, DEFAULT_PORT)])
}
