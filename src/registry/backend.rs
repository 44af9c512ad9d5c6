//! Backend descriptors and their runtime stats.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::BackendConfig;
use crate::registry::RegistryError;

/// Milliseconds since the Unix epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A routable downstream server.
///
/// Immutable once registered; replaced wholesale by an explicit update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDescriptor {
    /// Unique backend identifier.
    pub id: String,
    /// Base URL requests are forwarded to.
    pub base_url: Url,
    /// Declared workload affinity.
    #[serde(default)]
    pub specialization: Option<String>,
    /// Declared security level.
    #[serde(default)]
    pub security_level: Option<u8>,
}

impl BackendDescriptor {
    /// Create a descriptor, validating the base address.
    pub fn new(id: impl Into<String>, address: &str) -> Result<Self, RegistryError> {
        let id = id.into();
        let invalid = |reason: String| RegistryError::InvalidAddress {
            id: id.clone(),
            reason,
        };

        if id.trim().is_empty() {
            return Err(invalid("backend id is empty".to_string()));
        }

        let base_url = Url::parse(address).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", base_url.scheme())));
        }
        if base_url.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        Ok(Self {
            id,
            base_url,
            specialization: None,
            security_level: None,
        })
    }

    /// Build a descriptor from its configuration entry.
    pub fn from_config(config: &BackendConfig) -> Result<Self, RegistryError> {
        let mut descriptor = Self::new(config.id.clone(), &config.address)?;
        descriptor.specialization = config.specialization.clone();
        descriptor.security_level = config.security_level;
        Ok(descriptor)
    }

    pub fn with_specialization(mut self, tag: impl Into<String>) -> Self {
        self.specialization = Some(tag.into());
        self
    }

    pub fn with_security_level(mut self, level: u8) -> Self {
        self.security_level = Some(level);
        self
    }

    /// Absolute URL for `path_and_query` on this backend.
    ///
    /// The path is appended to the base URL as-is.
    pub fn url_for(&self, path_and_query: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        if path_and_query.starts_with('/') {
            format!("{}{}", base, path_and_query)
        } else {
            format!("{}/{}", base, path_and_query)
        }
    }

    /// `host[:port]` used to rewrite the Host header.
    pub fn authority(&self) -> String {
        let host = self.base_url.host_str().unwrap_or_default();
        match self.base_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

/// Latest host telemetry reported for a backend.
///
/// Overwritten wholesale on each refresh; no history is kept.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStats {
    /// CPU load in [0, 100].
    pub cpu_load: f64,
    /// Memory usage in percent.
    pub memory_percent: f64,
    pub active_connections: u64,
    pub throughput: f64,
    pub updated_at_ms: u64,
    /// Set when the last refresh failed and this value was retained.
    pub stale: bool,
}
