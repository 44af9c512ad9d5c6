//! Health probes.
//!
//! # Responsibilities
//! - Issue `GET {base}{path}` to a backend
//! - Treat non-2xx, transport errors and unparsable bodies as failures
//! - Extract the reported load, connections and specialization

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registry::BackendDescriptor;

/// Upper bound on a probe response body.
const MAX_PROBE_BODY: usize = 64 * 1024;

/// Body returned by a backend health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    /// Load in [0, 100].
    pub load: f64,
    #[serde(default)]
    pub active_connections: Option<u64>,
    #[serde(default)]
    pub specialization: Option<String>,
}

/// Why a probe counted as a failure.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0}ms")]
    Timeout(u64),

    #[error("probe transport error: {0}")]
    Transport(String),

    #[error("probe returned status {0}")]
    Status(u16),

    #[error("probe body is invalid: {0}")]
    InvalidBody(String),
}

/// Health check capability.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe one backend. Timeouts are enforced by the caller.
    async fn probe(&self, backend: &BackendDescriptor) -> Result<ProbeReport, ProbeError>;
}

/// HTTP prober backed by a pooled hyper client.
pub struct HttpProber {
    client: Client<HttpConnector, Body>,
    path: String,
}

impl HttpProber {
    pub fn new(path: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, backend: &BackendDescriptor) -> Result<ProbeReport, ProbeError> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(backend.url_for(&self.path))
            .header(header::USER_AGENT, "smart-balancer-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let bytes = axum::body::to_bytes(Body::new(response.into_body()), MAX_PROBE_BODY)
            .await
            .map_err(|e| ProbeError::InvalidBody(e.to_string()))?;

        let mut report: ProbeReport =
            serde_json::from_slice(&bytes).map_err(|e| ProbeError::InvalidBody(e.to_string()))?;
        report.load = report.load.clamp(0.0, 100.0);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_parsing() {
        let report: ProbeReport = serde_json::from_str(
            r#"{"id": "server2", "load": 35, "activeConnections": 12, "specialization": "users"}"#,
        )
        .unwrap();
        assert_eq!(report.load, 35.0);
        assert_eq!(report.active_connections, Some(12));
        assert_eq!(report.specialization.as_deref(), Some("users"));

        let minimal: ProbeReport = serde_json::from_str(r#"{"load": 0}"#).unwrap();
        assert_eq!(minimal.active_connections, None);
        assert!(serde_json::from_str::<ProbeReport>(r#"{"status": "ok"}"#).is_err());
    }
}
