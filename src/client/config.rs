use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::commands::PollPolicy;

pub const ENDPOINT_OVERRIDE_ENV: &str = "THETA_ENDPOINT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the camera, e.g. `http://192.168.1.1:80`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub poll: PollPolicy,
}

fn default_endpoint() -> String {
    "http://192.168.1.1:80".to_string()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_connect_timeout() -> u64 {
    5
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            poll: PollPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = fs::read_to_string(path).context("reading config file")?;
        let mut cfg: ClientConfig = serde_json::from_str(&raw).context("parsing client config JSON")?;
        cfg.apply_env();
        Ok(cfg)
    }

    /// Config file when it exists, defaults otherwise.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            return Self::from_file(path);
        }
        let mut cfg = Self::default();
        cfg.apply_env();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var(ENDPOINT_OVERRIDE_ENV) {
            if !endpoint.is_empty() {
                self.endpoint = endpoint;
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Backoff;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parsing() {
        std::env::remove_var(ENDPOINT_OVERRIDE_ENV);
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "endpoint": "http://192.168.1.1:80",
                "request_timeout_secs": 30,
                "poll": {{"backoff": "exponential", "interval_ms": 500, "max_transient_failures": 5}}
            }}"#
        )
        .unwrap();

        let config = ClientConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.endpoint, "http://192.168.1.1:80");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.poll.backoff, Backoff::Exponential);
        assert_eq!(config.poll.interval_ms, 500);
        assert_eq!(config.poll.max_transient_failures, 5);
        assert_eq!(config.poll.deadline_ms, 120_000);
    }

    #[test]
    fn test_config_missing_file() {
        let result = ClientConfig::from_file("/nonexistent/path/theta.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{invalid json").unwrap();

        let result = ClientConfig::from_file(file.path().to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.endpoint, "http://192.168.1.1:80");
        assert_eq!(config.poll, PollPolicy::default());
    }
}
