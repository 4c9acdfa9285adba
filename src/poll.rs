use std::{sync::Arc, time::Duration};

use pyng::{tokio::probe_first_reachable, Candidate, Exhausted, SrvLookup};
use tokio::select;

use crate::{
    config::Config,
    metrics::{GaugeSink, PING_DELAY, PLAYER_COUNT},
};

/// The outcome of one successful poll of a configured target.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub target: String,
    pub candidate: Candidate,
    pub players_online: i64,
    pub latency: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum PollError {
    #[error("could not resolve target: {0}")]
    Resolution(#[from] pyng::Error),
    #[error("target resolved to no candidates")]
    ResolutionEmpty,
    #[error(transparent)]
    Exhausted(#[from] Exhausted),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Polls every configured target once per interval and publishes the results.
pub struct Poller<L> {
    config: Arc<Config>,
    sink: Arc<dyn GaugeSink>,
    lookup: L,
}

impl<L: SrvLookup + Send + Sync> Poller<L> {
    pub fn new(config: Arc<Config>, sink: Arc<dyn GaugeSink>, lookup: L) -> Self {
        Self {
            config,
            sink,
            lookup,
        }
    }

    /// Resolve `target` and probe its candidates until one answers.
    pub async fn poll_target(&self, target: &str) -> Result<PollResult, PollError> {
        let candidates = pyng::resolve(target, &self.lookup).await?;
        if candidates.is_empty() {
            return Err(PollError::ResolutionEmpty);
        }
        debug!(host = target, ?candidates, "resolved");
        let probed = probe_first_reachable(
            &candidates,
            self.config.protocol_version,
            Some(self.config.timeout),
        )
        .await?;
        for (candidate, error) in &probed.failures {
            warn!(host = target, %candidate, %error, "candidate failed, trying the next one");
        }
        Ok(PollResult {
            target: target.to_owned(),
            candidate: probed.candidate,
            players_online: probed.status.players.online,
            latency: probed.latency,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn publish(&self, result: &PollResult) {
        let labels = [("host", result.target.as_str())];
        self.sink
            .set(PLAYER_COUNT, &labels, result.players_online as f64);
        self.sink
            .set(PING_DELAY, &labels, result.latency.as_secs_f64());
    }

    /// One sequential pass over all targets. A failing target publishes
    /// nothing, so its gauges keep their last good value.
    pub async fn poll_cycle(&self) -> CycleSummary {
        let mut summary = CycleSummary::default();
        for target in &self.config.targets {
            match self.poll_target(target).await {
                Ok(result) => {
                    self.publish(&result);
                    info!(
                        host = target,
                        candidate = %result.candidate,
                        players = result.players_online,
                        latency = ?result.latency,
                        "polled"
                    );
                    summary.succeeded += 1;
                }
                Err(PollError::Exhausted(exhausted)) => {
                    for (candidate, error) in &exhausted.failures {
                        warn!(host = target, %candidate, %error, "candidate failed");
                    }
                    warn!(host = target, "no candidate answered, keeping previous values");
                    summary.failed += 1;
                }
                Err(error) => {
                    warn!(host = target, %error, "poll failed");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Poll forever, sleeping the configured interval between passes, until
    /// a shutdown signal arrives. A pass in progress always completes.
    pub async fn run(self) {
        loop {
            info!(targets = self.config.targets.len(), "Fetching all targets");
            let summary = self.poll_cycle().await;
            info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Poll cycle finished"
            );
            let sleep = tokio::time::sleep(self.config.poll_interval);
            select! {
                _ = sleep => {},
                _ = vss::shutdown_signal() => break,
            }
        }
        info!("Poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use pyng::{
        packet::{read_packet, Packet},
        Error,
    };
    use tokio::net::TcpListener;

    use super::*;
    use crate::metrics::Registry;

    struct FixedSrv(Vec<Candidate>);

    impl SrvLookup for FixedSrv {
        async fn lookup_srv(&self, _name: &str) -> Result<Vec<Candidate>, Error> {
            Ok(self.0.clone())
        }
    }

    async fn answer(mut stream: tokio::net::TcpStream, online: i64) -> Result<(), Error> {
        read_packet(&mut stream).await?;
        read_packet(&mut stream).await?;
        let response = format!(
            r#"{{"version":{{"name":"1.20.4","protocol":765}},"players":{{"max":100,"online":{online}}},"description":"test"}}"#
        );
        Packet::Response { response }.send(&mut stream).await?;
        let token = read_packet(&mut stream).await?.ping_token()?;
        Packet::Pong { payload: token }.send(&mut stream).await
    }

    async fn live_server(online: i64) -> Candidate {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(answer(stream, online));
            }
        });
        Candidate::new("127.0.0.1", port)
    }

    async fn dead_server() -> Candidate {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        Candidate::new("127.0.0.1", port)
    }

    fn config(targets: Vec<String>) -> Arc<Config> {
        Arc::new(Config {
            listen_address: "127.0.0.1:0".into(),
            targets,
            protocol_version: 765,
            poll_interval: Duration::from_secs(60),
            debug: false,
            timeout: Duration::from_secs(5),
        })
    }

    fn players(registry: &Registry, target: &str) -> Option<f64> {
        registry.get(PLAYER_COUNT, &[("host", target)])
    }

    #[tokio::test]
    async fn fallback_candidate_publishes_once_under_the_target_label() {
        let dead = dead_server().await;
        let live = live_server(42).await;
        let registry = Arc::new(Registry::new());
        let poller = Poller::new(
            config(vec!["play.example.net".into()]),
            registry.clone(),
            FixedSrv(vec![dead, live.clone()]),
        );

        let result = poller.poll_target("play.example.net").await.unwrap();
        assert_eq!(result.candidate, live);
        assert_eq!(result.players_online, 42);

        let summary = poller.poll_cycle().await;
        assert_eq!(summary, CycleSummary { succeeded: 1, failed: 0 });
        assert_eq!(players(&registry, "play.example.net"), Some(42.0));
        assert!(registry.get(PING_DELAY, &[("host", "play.example.net")]).is_some());
        assert_eq!(players(&registry, &live.to_string()), None);
        assert_eq!(registry.render().matches("mcping_playercount{").count(), 1);
    }

    #[tokio::test]
    async fn failing_target_does_not_block_the_others() {
        let dead = dead_server().await.to_string();
        let live = live_server(5).await.to_string();
        let registry = Arc::new(Registry::new());
        let poller = Poller::new(
            config(vec![dead.clone(), "bad:port".into(), live.clone()]),
            registry.clone(),
            FixedSrv(Vec::new()),
        );

        let summary = poller.poll_cycle().await;
        assert_eq!(summary, CycleSummary { succeeded: 1, failed: 2 });
        assert_eq!(players(&registry, &live), Some(5.0));
        assert_eq!(players(&registry, &dead), None);
    }

    #[tokio::test]
    async fn failed_poll_keeps_the_previous_value() {
        let dead = dead_server().await.to_string();
        let registry = Arc::new(Registry::new());
        registry.set(PLAYER_COUNT, &[("host", &dead)], 17.0);
        let poller = Poller::new(config(vec![dead.clone()]), registry.clone(), FixedSrv(Vec::new()));

        let error = poller.poll_target(&dead).await.unwrap_err();
        assert!(matches!(error, PollError::Exhausted(ref e) if e.failures.len() == 1));

        poller.poll_cycle().await;
        assert_eq!(players(&registry, &dead), Some(17.0));
    }

    #[tokio::test]
    async fn unresolvable_target_is_a_resolution_error() {
        let registry = Arc::new(Registry::new());
        let poller = Poller::new(config(vec!["host:abc".into()]), registry, FixedSrv(Vec::new()));
        assert!(matches!(
            poller.poll_target("host:abc").await,
            Err(PollError::Resolution(Error::InvalidAddress))
        ));
    }
}
