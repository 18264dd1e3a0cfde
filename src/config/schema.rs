//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Shutdown phase budgets.
    pub shutdown: ShutdownSettings,

    /// OS signal handling.
    pub signals: SignalSettings,

    /// HTTP server settings.
    pub http: HttpSettings,

    /// Raw TCP listener settings.
    pub listener: ListenerConfig,

    /// Credential refresh loop settings.
    pub identity: IdentitySettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Shutdown phase budgets, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownSettings {
    /// Bound on each server and listener close.
    pub grace_period_ms: u64,

    /// Bound on waiting for servers and listeners to quiesce together.
    pub drain_timeout_ms: u64,

    /// Bound on closing identity providers.
    pub force_timeout_ms: u64,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: 30_000,
            drain_timeout_ms: 20_000,
            force_timeout_ms: 45_000,
        }
    }
}

/// Signal handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignalSettings {
    /// Install SIGTERM/SIGINT handlers.
    pub enabled: bool,

    /// Deadline for the whole shutdown once a signal arrives.
    pub overall_timeout_ms: u64,
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            overall_timeout_ms: 60_000,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9000").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// How often the credential watcher refreshes.
    pub refresh_interval_ms: u64,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 5_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
