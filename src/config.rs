use std::{path::Path, time::Duration};

use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not read configuration file: {0}")]
    Read(#[from] std::io::Error),
    #[error("could not parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The configuration file exactly as written.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(alias = "promListen")]
    listen_address: String,
    targets: Vec<String>,
    #[serde(default = "default_protocol_version")]
    protocol_version: i32,
    #[serde(default = "default_poll_interval")]
    poll_interval_seconds: u64,
    #[serde(default, alias = "debugLogging")]
    debug: bool,
    #[serde(default = "default_timeout")]
    timeout_seconds: u64,
}

const fn default_protocol_version() -> i32 {
    pyng::DEFAULT_PROTOCOL_VERSION
}

const fn default_poll_interval() -> u64 {
    60
}

const fn default_timeout() -> u64 {
    5
}

/// Validated, immutable process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `host:port` for the scrape endpoint; the host is resolved at bind time.
    pub listen_address: String,
    pub targets: Vec<String>,
    pub protocol_version: i32,
    pub poll_interval: Duration,
    pub debug: bool,
    /// Bound for each dial and each step of a probe.
    pub timeout: Duration,
}

impl Config {
    /// Where to read the configuration from: the first CLI argument, then
    /// `CONFIG_PATH`, then `config.json` in the working directory.
    pub fn path_from_env() -> String {
        std::env::args()
            .nth(1)
            .or_else(|| std::env::var("CONFIG_PATH").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(contents)?;
        Self::try_from(raw)
    }
}

impl TryFrom<RawConfig> for Config {
    type Error = ConfigError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let listen_address = parse_listen_address(&raw.listen_address)?;
        let targets: Vec<String> = raw
            .targets
            .into_iter()
            .map(|target| target.trim().to_owned())
            .collect();
        if targets.is_empty() {
            return Err(ConfigError::Invalid("`targets` must not be empty".into()));
        }
        if let Some(position) = targets.iter().position(String::is_empty) {
            return Err(ConfigError::Invalid(format!("target #{position} is empty")));
        }
        if raw.poll_interval_seconds == 0 {
            return Err(ConfigError::Invalid(
                "`pollIntervalSeconds` must be positive".into(),
            ));
        }
        if raw.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("`timeoutSeconds` must be positive".into()));
        }
        Ok(Self {
            listen_address,
            targets,
            protocol_version: raw.protocol_version,
            poll_interval: Duration::from_secs(raw.poll_interval_seconds),
            debug: raw.debug,
            timeout: Duration::from_secs(raw.timeout_seconds),
        })
    }
}

/// Accepts `host:port`, `[v6]:port` and the bare `:port` form, which binds on
/// all interfaces. Host names are left for the listener to resolve.
fn parse_listen_address(address: &str) -> Result<String, ConfigError> {
    let address = address.trim();
    let invalid = || ConfigError::Invalid(format!("`listenAddress` {address:?} is not host:port"));
    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    port.parse::<u16>().map_err(|_| invalid())?;
    if host.is_empty() {
        return Ok(format!("0.0.0.0:{port}"));
    }
    Ok(address.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let config = Config::from_json(
            r#"{
                "listenAddress": "127.0.0.1:9150",
                "targets": ["mc.example.net", "10.0.0.5:25570"],
                "protocolVersion": 765,
                "pollIntervalSeconds": 15,
                "debug": true,
                "timeoutSeconds": 2
            }"#,
        )
        .unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:9150");
        assert_eq!(config.targets, ["mc.example.net", "10.0.0.5:25570"]);
        assert_eq!(config.protocol_version, 765);
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert!(config.debug);
        assert_eq!(config.timeout, Duration::from_secs(2));
    }

    #[test]
    fn legacy_format_gets_defaults() {
        let config =
            Config::from_json(r#"{"promListen": ":8080", "targets": ["a"], "somethingElse": 1}"#)
                .unwrap();
        assert_eq!(config.listen_address, "0.0.0.0:8080");
        assert_eq!(config.protocol_version, 578);
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.debug);
    }

    #[test]
    fn debug_logging_key_enables_debug() {
        let config = Config::from_json(
            r#"{"listenAddress": ":9150", "targets": ["a"], "pollIntervalSeconds": 30, "debugLogging": true}"#,
        )
        .unwrap();
        assert!(config.debug);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn host_names_are_kept_for_the_listener() {
        let config =
            Config::from_json(r#"{"listenAddress": "localhost:9100", "targets": ["a"]}"#).unwrap();
        assert_eq!(config.listen_address, "localhost:9100");
        let config =
            Config::from_json(r#"{"promListen": "[::1]:9100", "targets": ["a"]}"#).unwrap();
        assert_eq!(config.listen_address, "[::1]:9100");
    }

    #[test]
    fn invalid_configs_are_rejected() {
        for contents in [
            r#"{"listenAddress": "nowhere", "targets": ["a"]}"#,
            r#"{"listenAddress": "localhost:http", "targets": ["a"]}"#,
            r#"{"listenAddress": ":1", "targets": []}"#,
            r#"{"listenAddress": ":1", "targets": ["a", " "]}"#,
            r#"{"listenAddress": ":1", "targets": ["a"], "pollIntervalSeconds": 0}"#,
            r#"{"listenAddress": ":1", "targets": ["a"], "timeoutSeconds": 0}"#,
        ] {
            assert!(
                matches!(Config::from_json(contents), Err(ConfigError::Invalid(_))),
                "{contents}"
            );
        }
        assert!(matches!(
            Config::from_json(r#"{"targets": ["a"]}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"listenAddress": ":1", "targets": "a"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            Config::load("/nonexistent/mcping-exporter/config.json"),
            Err(ConfigError::Read(_))
        ));
    }
}
