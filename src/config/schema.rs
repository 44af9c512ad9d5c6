//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend server definitions, in registration order.
    pub backends: Vec<BackendConfig>,

    /// Strategy selection and performance history sizing.
    pub balancer: StrategyConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Outbound forwarding settings.
    pub forwarding: ForwardingConfig,

    /// Runtime stats refresh settings.
    pub stats: StatsConfig,

    /// Request classification rules.
    pub classification: Vec<ClassificationRule>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3010").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3010".to_string(),
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub id: String,

    /// Backend base URL (e.g., "http://127.0.0.1:3001").
    pub address: String,

    /// Declared workload affinity ("static", "api", "compute", ...).
    #[serde(default)]
    pub specialization: Option<String>,

    /// Declared security level.
    #[serde(default)]
    pub security_level: Option<u8>,
}

/// Strategy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Selection algorithm name.
    pub algorithm: String,

    /// Maximum latency samples retained per backend.
    pub max_performance_history: usize,

    /// Number of most recent samples averaged by the weight engine.
    pub performance_history_sample_window: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            algorithm: "weighted-round-robin".to_string(),
            max_performance_history: 1000,
            performance_history_sample_window: 100,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic health check loop.
    pub enabled: bool,

    /// Health check interval in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path to probe.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub failure_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub success_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 5000,
            timeout_ms: 5000,
            path: "/health".to_string(),
            failure_threshold: 3,
            success_threshold: 2,
        }
    }
}

/// Forwarding configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Total time allowed for one forwarded exchange, in milliseconds.
    pub timeout_ms: u64,

    /// Maximum request body accepted for forwarding.
    pub max_body_bytes: usize,

    /// Maximum backend response body buffered before replying.
    pub max_response_bytes: usize,

    /// Time allowed for each predictor or cache optimizer call, in milliseconds.
    pub collaborator_timeout_ms: u64,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_body_bytes: 2 * 1024 * 1024,
            max_response_bytes: 16 * 1024 * 1024,
            collaborator_timeout_ms: 1000,
        }
    }
}

/// Runtime stats source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Enable the periodic stats refresh.
    pub enabled: bool,

    /// Refresh interval in milliseconds.
    pub interval_ms: u64,

    /// Per-backend fetch timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path serving the stats document.
    pub path: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: 60_000,
            timeout_ms: 5000,
            path: "/stats".to_string(),
        }
    }
}

/// Rule mapping request metadata to a content classification tag.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassificationRule {
    /// Rule identifier for logging.
    pub name: String,

    /// Host header to match (exact match).
    #[serde(default)]
    pub host: Option<String>,

    /// Path prefix to match.
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Classification assigned on match.
    pub tag: String,

    /// Rule priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
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

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
