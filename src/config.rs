//! Client configuration
//!
//! A single `ClientConfig` is injected into the session at construction; no
//! component builds backend URLs on its own.

use crate::error::{ConsoleError, ConsoleResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How the incident list is refreshed after a hunt has been triggered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SettleConfig {
    /// Wait once, refresh once
    FixedDelay { delay_ms: u64 },
    /// Refresh with growing pauses until the list grows or attempts run out
    Backoff {
        initial_ms: u64,
        factor: u32,
        max_attempts: u32,
    },
}

impl Default for SettleConfig {
    fn default() -> Self {
        SettleConfig::FixedDelay { delay_ms: 500 }
    }
}

/// Connection settings for the analytics backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base endpoint every request is resolved against
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Post-hunt refresh strategy
    pub settle: SettleConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 30,
            settle: SettleConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `base_url`
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> ConsoleResult<Self> {
        let config: ClientConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConsoleError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConsoleResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ConsoleError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    /// Base URL without a trailing slash
    pub fn endpoint(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> ConsoleResult<()> {
        let endpoint = self.endpoint();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ConsoleError::Config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConsoleError::Config("request_timeout_secs must be positive".to_string()));
        }
        if let SettleConfig::Backoff { factor, max_attempts, .. } = self.settle {
            if factor == 0 || max_attempts == 0 {
                return Err(ConsoleError::Config(
                    "backoff factor and max_attempts must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}
