//! Configuration surface for the DDARP routing daemon (spec.md §6).
//!
//! Modeled on the teacher's `alphapulse-config`: a plain `serde`-backed
//! struct loaded from TOML, with defaults expressed as `Default` and
//! validated once at startup. `ConfigError` is fatal (spec.md §7) — there
//! is no recovery path for a bad config, only a clear message.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// A node's role, as carried on the wire config surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeTypeConfig {
    Regular,
    Border,
}

/// Errors raised while loading or validating a [`DaemonConfig`].
///
/// Startup-only and fatal (spec.md §7 `ConfigError`).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// The full configuration surface (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub node_id: String,
    #[serde(default = "default_node_type")]
    pub node_type: NodeTypeConfig,
    #[serde(default = "default_owl_port")]
    pub owl_port: u16,
    /// External management-surface port. DDARP itself never binds this —
    /// it is carried through for the HTTP/JSON collaborator (spec.md §1).
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// HMAC signing key for OWL probes. Never logged or `Debug`-printed
    /// in full.
    pub shared_secret: String,
    #[serde(default = "default_probe_interval_s")]
    pub probe_interval_s: f64,
    #[serde(default = "default_probe_timeout_s")]
    pub probe_timeout_s: f64,
    #[serde(default = "default_metric_window_s")]
    pub metric_window_s: f64,
    #[serde(default = "default_hysteresis_threshold")]
    pub hysteresis_threshold: f64,
    #[serde(default = "default_route_freshness_s")]
    pub route_freshness_s: u64,
}

fn default_node_type() -> NodeTypeConfig {
    NodeTypeConfig::Regular
}
fn default_owl_port() -> u16 {
    8080
}
fn default_api_port() -> u16 {
    8000
}
fn default_probe_interval_s() -> f64 {
    1.0
}
fn default_probe_timeout_s() -> f64 {
    5.0
}
fn default_metric_window_s() -> f64 {
    30.0
}
fn default_hysteresis_threshold() -> f64 {
    0.20
}
fn default_route_freshness_s() -> u64 {
    120
}

impl DaemonConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: DaemonConfig = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate invariants that `serde` defaults can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.trim().is_empty() {
            return Err(ConfigError::Invalid("node_id must not be empty"));
        }
        if self.node_id.len() > 64 {
            return Err(ConfigError::Invalid("node_id must be at most 64 bytes"));
        }
        if self.shared_secret.is_empty() {
            return Err(ConfigError::Invalid("shared_secret must not be empty"));
        }
        if self.probe_interval_s <= 0.0 {
            return Err(ConfigError::Invalid("probe_interval_s must be positive"));
        }
        if self.probe_timeout_s <= self.probe_interval_s {
            return Err(ConfigError::Invalid(
                "probe_timeout_s must exceed probe_interval_s",
            ));
        }
        if !(0.0..=1.0).contains(&self.hysteresis_threshold) {
            return Err(ConfigError::Invalid(
                "hysteresis_threshold must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs_f64(self.probe_interval_s)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.probe_timeout_s)
    }

    pub fn metric_window(&self) -> Duration {
        Duration::from_secs_f64(self.metric_window_s)
    }

    pub fn route_freshness(&self) -> Duration {
        Duration::from_secs(self.route_freshness_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let file = write_config(
            r#"
            node_id = "node-a"
            shared_secret = "secret"
            "#,
        );
        let config = DaemonConfig::from_file(file.path()).unwrap();
        assert_eq!(config.owl_port, 8080);
        assert_eq!(config.hysteresis_threshold, 0.20);
        assert_eq!(config.route_freshness_s, 120);
    }

    #[test]
    fn rejects_empty_node_id() {
        let file = write_config(
            r#"
            node_id = ""
            shared_secret = "secret"
            "#,
        );
        assert!(DaemonConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn rejects_timeout_not_exceeding_interval() {
        let file = write_config(
            r#"
            node_id = "node-a"
            shared_secret = "secret"
            probe_interval_s = 5.0
            probe_timeout_s = 5.0
            "#,
        );
        assert!(DaemonConfig::from_file(file.path()).is_err());
    }
}
