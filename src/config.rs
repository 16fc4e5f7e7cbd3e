use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::overlay::weave::DEFAULT_COMMAND;
use crate::probe::ProbeIntervals;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
    /// Base URL of the weave router. The weave tagger only runs when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weave_router_url: Option<String>,
    pub weave_command: String,
    pub docker: bool,
    /// Only report container addresses on this Docker network.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_network: Option<String>,
    pub spy_interval_ms: u64,
    pub publish_interval_ms: u64,
    pub tagger_timeout_ms: u64,
    pub window_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_id: None,
            weave_router_url: None,
            weave_command: DEFAULT_COMMAND.into(),
            docker: true,
            docker_network: None,
            spy_interval_ms: 1_000,
            publish_interval_ms: 3_000,
            tagger_timeout_ms: 2_000,
            window_secs: 15,
        }
    }
}

impl Config {
    /// Defaults, then `scoped.toml`, `scoped.json` and `SCOPED_*` variables.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("scoped.toml"))
            .merge(Json::file("scoped.json"))
            .merge(Env::prefixed("SCOPED_"))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        // Inside a container the hostname is the most stable id we have.
        if config.host_id.is_none() {
            config.host_id = Some(std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into()));
        }

        for (name, value) in [
            ("spy_interval_ms", config.spy_interval_ms),
            ("publish_interval_ms", config.publish_interval_ms),
            ("tagger_timeout_ms", config.tagger_timeout_ms),
        ] {
            if value == 0 {
                anyhow::bail!("Invalid {}: must be greater than zero", name);
            }
        }

        Ok(config)
    }

    pub fn host_id(&self) -> &str {
        self.host_id.as_deref().unwrap_or("localhost")
    }

    pub fn intervals(&self) -> ProbeIntervals {
        ProbeIntervals {
            spy: Duration::from_millis(self.spy_interval_ms),
            publish: Duration::from_millis(self.publish_interval_ms),
            call_timeout: Duration::from_millis(self.tagger_timeout_ms),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::from_figment(defaults()).unwrap();
        assert!(config.docker);
        assert!(config.weave_router_url.is_none());
        assert_eq!(config.weave_command, "weave");
        assert!(config.host_id.is_some());
        assert_eq!(config.intervals().publish, Duration::from_secs(3));
    }

    #[test]
    fn toml_overrides_defaults() {
        let figment = defaults().merge(Toml::string(
            r#"
            host_id = "host1"
            weave_router_url = "127.0.0.1:6784"
            docker = false
            publish_interval_ms = 500
            "#,
        ));
        let config = Config::from_figment(figment).unwrap();
        assert_eq!(config.host_id(), "host1");
        assert_eq!(config.weave_router_url.as_deref(), Some("127.0.0.1:6784"));
        assert!(!config.docker);
        assert_eq!(config.intervals().publish, Duration::from_millis(500));
        assert_eq!(config.intervals().spy, Duration::from_secs(1));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let figment = defaults().merge(Toml::string("spy_interval_ms = 0"));
        assert!(Config::from_figment(figment).is_err());
    }
}
