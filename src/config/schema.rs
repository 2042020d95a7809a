//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! orchestrator. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AtcConfig {
    /// Service name used in logs.
    pub service: String,

    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Modules to run. Defaults to the `all` group.
    pub target: Vec<String>,

    /// Settings shared by the built-in modules.
    pub modules: ModulesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for AtcConfig {
    fn default() -> Self {
        Self {
            service: "atc".to_string(),
            server: ServerConfig::default(),
            target: vec!["all".to_string()],
            modules: ModulesConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8088").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8088".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Tick interval of the watcher modules, in seconds.
    pub watch_interval_secs: u64,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            watch_interval_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Expose `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}
