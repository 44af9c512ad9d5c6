//! Runtime stats sources.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::config::StatsConfig;
use crate::registry::{unix_millis, BackendDescriptor, RuntimeStats};

/// Errors fetching a backend's runtime stats.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("stats fetch for '{backend_id}' timed out after {timeout_ms}ms")]
    Timeout { backend_id: String, timeout_ms: u64 },

    #[error("stats fetch for '{backend_id}' failed: {reason}")]
    Transport { backend_id: String, reason: String },

    #[error("stats fetch for '{backend_id}' returned status {status}")]
    Status { backend_id: String, status: u16 },

    #[error("stats document from '{backend_id}' is invalid: {reason}")]
    InvalidBody { backend_id: String, reason: String },
}

/// Source of per-backend host telemetry.
#[async_trait]
pub trait StatsProvider: Send + Sync {
    /// Fetch the current stats of one backend.
    async fn fetch(&self, backend: &BackendDescriptor) -> Result<RuntimeStats, StatsError>;
}

/// Stats document served by a backend.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsDocument {
    cpu: f64,
    #[serde(default)]
    memory: f64,
    #[serde(default)]
    active_connections: u64,
    #[serde(default)]
    throughput: f64,
}

impl From<StatsDocument> for RuntimeStats {
    fn from(doc: StatsDocument) -> Self {
        Self {
            cpu_load: doc.cpu.clamp(0.0, 100.0),
            memory_percent: doc.memory.clamp(0.0, 100.0),
            active_connections: doc.active_connections,
            throughput: doc.throughput.max(0.0),
            updated_at_ms: unix_millis(),
            stale: false,
        }
    }
}

/// Fetches `GET {base}{path}` from each backend.
#[derive(Debug, Clone)]
pub struct HttpStatsProvider {
    client: reqwest::Client,
    path: String,
    timeout: Duration,
}

impl HttpStatsProvider {
    pub fn new(config: &StatsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            path: config.path.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[async_trait]
impl StatsProvider for HttpStatsProvider {
    async fn fetch(&self, backend: &BackendDescriptor) -> Result<RuntimeStats, StatsError> {
        let response = self
            .client
            .get(backend.url_for(&self.path))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StatsError::Timeout {
                        backend_id: backend.id.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    StatsError::Transport {
                        backend_id: backend.id.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::Status {
                backend_id: backend.id.clone(),
                status: status.as_u16(),
            });
        }

        let document: StatsDocument =
            response.json().await.map_err(|e| StatsError::InvalidBody {
                backend_id: backend.id.clone(),
                reason: e.to_string(),
            })?;

        Ok(document.into())
    }
}
