// src/config.rs
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::attachment::monitor::{PollOptions, DEFAULT_INTERVAL_MS, DEFAULT_TIMEOUT_MS};

pub const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5555";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub service_url: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            interval_ms: DEFAULT_INTERVAL_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    local: MonitorConfig,
    #[serde(default)]
    production: MonitorConfig,
}

impl MonitorConfig {
    /// Load `config.yaml` (if present) for the current environment, then apply
    /// environment variable overrides
    pub fn load() -> Result<Self> {
        let environment = Self::get_environment();
        info!("Loading monitor configuration for environment: {}", environment);

        Self::load_from_file(Path::new(CONFIG_FILE), &environment)?
            .apply_overrides(|key| std::env::var(key).ok())
    }

    fn get_environment() -> String {
        std::env::var("ENVIRONMENT")
            .or_else(|_| std::env::var("ENV"))
            .unwrap_or_else(|_| "local".to_string())
    }

    pub fn load_from_file(path: &Path, environment: &str) -> Result<Self> {
        if !path.exists() {
            info!("{} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml_str(&content, environment)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml_str(content: &str, environment: &str) -> Result<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(content)?;

        let config = match environment {
            "production" => config_file.production,
            _ => config_file.local,
        };
        config.validated()
    }

    /// Override fields from `ATTACHMENT_*` variables resolved through `lookup`
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup("ATTACHMENT_SERVICE_URL") {
            self.service_url = url;
        }
        if let Some(value) = lookup("ATTACHMENT_POLL_INTERVAL_MS") {
            self.interval_ms = parse_number("ATTACHMENT_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = lookup("ATTACHMENT_POLL_TIMEOUT_MS") {
            self.timeout_ms = parse_number("ATTACHMENT_POLL_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("ATTACHMENT_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_number("ATTACHMENT_REQUEST_TIMEOUT_SECS", &value)?;
        }
        self.validated()
    }

    pub fn with_service_url(mut self, url: String) -> Self {
        self.service_url = url;
        self
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions::from_millis(self.interval_ms, self.timeout_ms)
    }

    pub fn validated(self) -> Result<Self> {
        if self.service_url.trim().is_empty() {
            anyhow::bail!("service_url must not be empty");
        }
        if self.interval_ms == 0 {
            anyhow::bail!("interval_ms must be greater than zero");
        }
        if self.timeout_ms == 0 {
            anyhow::bail!("timeout_ms must be greater than zero");
        }
        Ok(self)
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .with_context(|| format!("{} must be a positive integer, got {:?}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.interval_ms, 2_000);
        assert_eq!(config.timeout_ms, 90_000);
        assert_eq!(
            config.poll_options(),
            PollOptions::from_millis(2_000, 90_000)
        );
    }

    #[test]
    fn test_yaml_sections_by_environment() {
        let yaml = r#"
local:
  service_url: http://localhost:9000
  interval_ms: 500
production:
  service_url: https://jobs.example.com/api
  timeout_ms: 120000
"#;
        let local = MonitorConfig::from_yaml_str(yaml, "local").unwrap();
        assert_eq!(local.service_url, "http://localhost:9000");
        assert_eq!(local.interval_ms, 500);
        assert_eq!(local.timeout_ms, 90_000);

        let prod = MonitorConfig::from_yaml_str(yaml, "production").unwrap();
        assert_eq!(prod.service_url, "https://jobs.example.com/api");
        assert_eq!(prod.interval_ms, 2_000);
        assert_eq!(prod.poll_options().timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config =
            MonitorConfig::load_from_file(Path::new("/nonexistent/config.yaml"), "local").unwrap();
        assert_eq!(config, MonitorConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ATTACHMENT_SERVICE_URL", "http://status.internal"),
            ("ATTACHMENT_POLL_INTERVAL_MS", " 250 "),
            ("ATTACHMENT_POLL_TIMEOUT_MS", "1000"),
        ]
        .into_iter()
        .collect();

        let config = MonitorConfig::default()
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.service_url, "http://status.internal");
        assert_eq!(config.interval_ms, 250);
        assert_eq!(config.timeout_ms, 1_000);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_overrides_are_rejected() {
        let bad = MonitorConfig::default().apply_overrides(|key| {
            (key == "ATTACHMENT_POLL_INTERVAL_MS").then(|| "soon".to_string())
        });
        assert!(bad.is_err());

        let zero = MonitorConfig::default().apply_overrides(|key| {
            (key == "ATTACHMENT_POLL_TIMEOUT_MS").then(|| "0".to_string())
        });
        assert!(zero.is_err());
    }
}
