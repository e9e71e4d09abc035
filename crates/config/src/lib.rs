use core::time::Duration;
use std::fs::{read_to_string, write};

use camino::Utf8Path;
use eyre::{bail, Result as EyreResult, WrapErr};
use serde::{Deserialize, Serialize};
use waku_primitives::{Protocols, PubSubTopic};

pub const CONFIG_FILE: &str = "config.toml";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_PAGE_SIZE: u64 = 10;

#[derive(Clone, Debug, Deserialize, Serialize)]
#[non_exhaustive]
pub struct NodeConfig {
    #[serde(default)]
    pub pubsub_topic: PubSubTopic,

    /// Deliver the node's own relay publications to its observers.
    #[serde(default)]
    pub emit_self: bool,

    pub protocols: Vec<Protocols>,

    #[serde(
        rename = "request_timeout_ms",
        with = "serde_duration",
        default = "default_request_timeout"
    )]
    pub request_timeout: Duration,

    #[serde(default)]
    pub readiness: ReadinessConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct ReadinessConfig {
    /// How often the peer registry is re-checked while waiting, in addition
    /// to reacting to identify events.
    #[serde(rename = "poll_interval_ms", with = "serde_duration")]
    pub poll_interval: Duration,
}

impl ReadinessConfig {
    #[must_use]
    pub const fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[derive(Copy, Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct StoreConfig {
    pub page_size: u64,
}

impl StoreConfig {
    #[must_use]
    pub const fn new(page_size: u64) -> Self {
        Self { page_size }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

const fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

impl NodeConfig {
    /// Defaults for everything but the active protocols.
    #[must_use]
    pub fn new(protocols: Vec<Protocols>) -> Self {
        Self {
            pubsub_topic: PubSubTopic::default(),
            emit_self: false,
            protocols,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            readiness: ReadinessConfig::default(),
            store: StoreConfig::default(),
        }
    }

    #[must_use]
    pub fn is_active(&self, protocol: Protocols) -> bool {
        self.protocols.contains(&protocol)
    }

    pub fn validate(&self) -> EyreResult<()> {
        if self.pubsub_topic.as_str().is_empty() {
            bail!("pubsub topic must not be empty");
        }

        if self.protocols.is_empty() {
            bail!("at least one protocol must be active");
        }

        if self.request_timeout.is_zero() {
            bail!("request timeout must be positive");
        }

        if self.readiness.poll_interval.is_zero() {
            bail!("readiness poll interval must be positive");
        }

        if self.store.page_size == 0 {
            bail!("store page size must be positive");
        }

        Ok(())
    }

    #[must_use]
    pub fn exists(dir: &Utf8Path) -> bool {
        dir.join(CONFIG_FILE).is_file()
    }

    pub fn load(dir: &Utf8Path) -> EyreResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let content = read_to_string(&path)
            .wrap_err_with(|| format!("failed to read configuration from {path:?}"))?;

        let config: Self = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse configuration from {path:?}"))?;

        config
            .validate()
            .wrap_err_with(|| format!("invalid configuration in {path:?}"))?;

        Ok(config)
    }

    pub fn save(&self, dir: &Utf8Path) -> EyreResult<()> {
        let path = dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;

        write(&path, content)
            .wrap_err_with(|| format!("failed to write configuration to {path:?}"))?;

        Ok(())
    }
}

mod serde_duration {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use tempdir::TempDir;

    use super::*;

    fn temp_dir() -> eyre::Result<(TempDir, Utf8PathBuf)> {
        let dir = TempDir::new("waku-config")?;
        let path = Utf8PathBuf::from_path_buf(dir.path().to_owned())
            .map_err(|path| eyre::eyre!("non utf-8 temp path: {path:?}"))?;

        Ok((dir, path))
    }

    #[test]
    fn test_minimal_file_gets_defaults() -> eyre::Result<()> {
        let config: NodeConfig = toml::from_str(r#"protocols = ["relay", "lightpush"]"#)?;

        assert_eq!(config.pubsub_topic.as_str(), "/waku/2/default-waku/proto");
        assert!(!config.emit_self);
        assert_eq!(config.protocols, [Protocols::Relay, Protocols::LightPush]);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.readiness.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.store.page_size, DEFAULT_PAGE_SIZE);

        config.validate()
    }

    #[test]
    fn test_durations_are_milliseconds() -> eyre::Result<()> {
        let config: NodeConfig = toml::from_str(
            r#"
            protocols = ["store"]
            request_timeout_ms = 2500

            [readiness]
            poll_interval_ms = 250
            "#,
        )?;

        assert_eq!(config.request_timeout, Duration::from_millis(2_500));
        assert_eq!(config.readiness.poll_interval, Duration::from_millis(250));

        Ok(())
    }

    #[test]
    fn test_save_then_load() -> eyre::Result<()> {
        let (_guard, dir) = temp_dir()?;

        assert!(!NodeConfig::exists(&dir));

        let mut config = NodeConfig::new(vec![Protocols::Filter, Protocols::Store]);
        config.emit_self = true;
        config.store = StoreConfig::new(25);
        config.save(&dir)?;

        assert!(NodeConfig::exists(&dir));

        let loaded = NodeConfig::load(&dir)?;
        assert!(loaded.emit_self);
        assert_eq!(loaded.store.page_size, 25);
        assert_eq!(loaded.protocols, config.protocols);
        assert_eq!(loaded.pubsub_topic, config.pubsub_topic);

        Ok(())
    }

    #[test]
    fn test_invalid_file_is_rejected() -> eyre::Result<()> {
        let (_guard, dir) = temp_dir()?;

        write(
            dir.join(CONFIG_FILE),
            "protocols = [\"relay\"]\n[store]\npage_size = 0\n",
        )?;
        assert!(NodeConfig::load(&dir).is_err());

        write(dir.join(CONFIG_FILE), "protocols = []\n")?;
        assert!(NodeConfig::load(&dir).is_err());

        write(dir.join(CONFIG_FILE), "protocols = [\"gossip\"]\n")?;
        assert!(NodeConfig::load(&dir).is_err());

        assert!(NodeConfig::load(&dir.join("missing")).is_err());

        Ok(())
    }

    #[test]
    fn test_validation() {
        let mut config = NodeConfig::new(vec![Protocols::Relay]);
        assert!(config.validate().is_ok());

        config.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        config.request_timeout = DEFAULT_REQUEST_TIMEOUT;
        config.readiness = ReadinessConfig::new(Duration::ZERO);
        assert!(config.validate().is_err());

        config.readiness = ReadinessConfig::default();
        config.pubsub_topic = PubSubTopic::from("");
        assert!(config.validate().is_err());
    }
}
