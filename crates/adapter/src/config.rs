//! Adapter configuration

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Adapter configuration, read from `ADAPTER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_instance")]
    pub instance: String,

    /// API server port for health/metrics/ingestion
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Resource mapping refresh interval in seconds
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,

    /// Groups preferred, in order, when an unqualified resource is ambiguous
    #[serde(default)]
    pub preferred_groups: Vec<String>,

    /// Put the core group ahead of `preferred_groups`
    #[serde(default = "default_true")]
    pub prefer_core_group: bool,

    /// Regenerate mappings once when a request names an unknown resource
    #[serde(default = "default_true")]
    pub retry_on_miss: bool,

    /// Serve the `/write-metrics` routes
    #[serde(default = "default_true")]
    pub enable_ingestion: bool,

    /// Message logged at startup
    #[serde(default = "default_message")]
    pub message: String,
}

fn default_instance() -> String {
    std::env::var("POD_NAME").unwrap_or_else(|_| "metrics-adapter".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_discovery_interval() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

fn default_message() -> String {
    "Starting custom metrics adapter".to_string()
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            instance: default_instance(),
            api_port: default_api_port(),
            discovery_interval_secs: default_discovery_interval(),
            preferred_groups: Vec::new(),
            prefer_core_group: true,
            retry_on_miss: true,
            enable_ingestion: true,
            message: default_message(),
        }
    }
}

impl AdapterConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let source = config::Environment::with_prefix("ADAPTER")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("preferred_groups");

        let config = config::Config::builder().add_source(source).build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: config::Config) -> Result<Self> {
        let parsed: Self = config
            .try_deserialize()
            .context("Invalid adapter configuration")?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discovery_interval_secs == 0 {
            bail!("discovery_interval_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    /// Preferred groups as handed to the mapping cache
    pub fn effective_preferred_groups(&self) -> Vec<String> {
        let mut groups = Vec::with_capacity(self.preferred_groups.len() + 1);
        if self.prefer_core_group {
            groups.push(String::new());
        }
        for group in &self.preferred_groups {
            let group = group.trim();
            if !groups.iter().any(|g| g == group) {
                groups.push(group.to_string());
            }
        }
        groups
    }
}
