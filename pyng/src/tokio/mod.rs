mod java;

use std::{future::Future, sync::OnceLock, time::Duration};

use hickory_resolver::{
    TokioAsyncResolver,
    config::{ResolverConfig, ResolverOpts},
    error::ResolveErrorKind,
};

pub use java::{Exhausted, Handshake, ProbeError, Probed, dial, probe, probe_first_reachable};

use crate::{Candidate, Error, SrvLookup};

/// Represents a pingable entity.
pub trait AsyncPingable {
    /// The type of response that is expected in reply to the ping.
    type Response;

    /// Ping the entity, gathering the latency and response.
    fn ping(self) -> impl Future<Output = Result<(Duration, Self::Response), Error>> + Send;
}

/// Retrieve the status of a given Minecraft server using a `AsyncPingable` configuration.
///
/// Returns `(latency, response)` where response is a response type of the `Pingable` configuration.
///
/// # Examples
///
/// Ping a Java Server with a five second timeout per step:
///
/// ```no_run
/// # async {
/// use std::time::Duration;
///
/// let (latency, response) = pyng::tokio::get_status(pyng::Java {
///     server_address: "mc.hypixel.net".into(),
///     timeout: Some(Duration::from_secs(5)),
///     ..Default::default()
/// }).await?;
/// # Ok::<(), pyng::Error>(())
/// # };
/// ```
///
/// # Errors
/// If the server status cannot be recieved
pub async fn get_status<P: AsyncPingable + Send>(pingable: P) -> Result<(Duration, P::Response), Error> {
    pingable.ping().await
}

fn new_resolver() -> TokioAsyncResolver {
    let config = ResolverConfig::cloudflare();
    let mut opts = ResolverOpts::default();
    opts.cache_size = 64;
    opts.attempts = 3;
    TokioAsyncResolver::tokio(config, opts)
}

pub fn resolver() -> &'static TokioAsyncResolver {
    static RESOLVER: OnceLock<TokioAsyncResolver> = OnceLock::new();
    RESOLVER.get_or_init(new_resolver)
}

impl SrvLookup for TokioAsyncResolver {
    async fn lookup_srv(&self, name: &str) -> Result<Vec<Candidate>, Error> {
        let records = match self.srv_lookup(name).await {
            Ok(records) => records,
            Err(error) if matches!(error.kind(), ResolveErrorKind::NoRecordsFound { .. }) => {
                return Ok(Vec::new());
            }
            Err(error) => {
                tracing::debug!(name, ?error, "SRV query failed");
                return Err(Error::DnsLookupFailed);
            }
        };
        Ok(records
            .iter()
            .filter_map(|srv| srv_candidate(&srv.target().to_utf8(), srv.port()))
            .collect())
    }
}

/// A target of `.` means the service is deliberately not offered there.
fn srv_candidate(target: &str, port: u16) -> Option<Candidate> {
    let host = target.trim_end_matches('.');
    (!host.is_empty()).then(|| Candidate::new(host, port))
}
