//! Configuration types for docker-dns-sync.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

use crate::error::SyncError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sync engine configuration.
    pub sync: SyncConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Sync engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Identity of this sync instance, used as the ownership tag on every
    /// record it registers.
    pub hostname: String,

    /// Seconds between reconciliation ticks. Must be positive.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Prefix of the container labels that declare records
    /// (e.g. `dns` for `dns.A.name` / `dns.A.value`).
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,

    /// Address substituted for A records whose value label is missing.
    #[serde(default = "default_host_ip")]
    pub host_ip: Ipv4Addr,
}

impl SyncConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.hostname.is_empty() {
            return Err(SyncError::Config("hostname must not be empty".to_string()));
        }
        if self.poll_interval == 0 {
            return Err(SyncError::Config(
                "poll_interval must be positive".to_string(),
            ));
        }
        if self.label_prefix.is_empty() {
            return Err(SyncError::Config(
                "label_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g. "info", "debug", "docker_dns_sync=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_poll_interval() -> u64 {
    5
}

fn default_label_prefix() -> String {
    "dns".to_string()
}

fn default_host_ip() -> Ipv4Addr {
    Ipv4Addr::LOCALHOST
}

fn default_log_level() -> String {
    "info".to_string()
}
