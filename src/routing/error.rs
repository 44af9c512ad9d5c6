//! Errors surfaced to request callers.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no healthy backends available")]
    NoHealthyBackends { request_id: String },

    #[error("no available backend")]
    NoAvailableBackend { request_id: String },

    #[error("invalid request: {reason}")]
    InvalidRequest {
        request_id: String,
        reason: String,
        status: StatusCode,
    },

    #[error("forwarding to backend '{backend_id}' failed: {reason}")]
    ForwardingFailure {
        request_id: String,
        backend_id: String,
        reason: String,
    },

    #[error("backend '{backend_id}' did not respond within {timeout_ms}ms")]
    ForwardingTimeout {
        request_id: String,
        backend_id: String,
        timeout_ms: u64,
    },
}

impl RouteError {
    pub fn status(&self) -> StatusCode {
        match self {
            RouteError::NoHealthyBackends { .. } | RouteError::NoAvailableBackend { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RouteError::InvalidRequest { status, .. } => *status,
            RouteError::ForwardingFailure { .. } => StatusCode::BAD_GATEWAY,
            RouteError::ForwardingTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            RouteError::NoHealthyBackends { request_id }
            | RouteError::NoAvailableBackend { request_id }
            | RouteError::InvalidRequest { request_id, .. }
            | RouteError::ForwardingFailure { request_id, .. }
            | RouteError::ForwardingTimeout { request_id, .. } => request_id,
        }
    }

    pub fn backend_id(&self) -> Option<&str> {
        match self {
            RouteError::ForwardingFailure { backend_id, .. }
            | RouteError::ForwardingTimeout { backend_id, .. } => Some(backend_id),
            _ => None,
        }
    }

    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteError::NoHealthyBackends { .. } => "no_healthy_backends",
            RouteError::NoAvailableBackend { .. } => "no_available_backend",
            RouteError::InvalidRequest { .. } => "invalid_request",
            RouteError::ForwardingFailure { .. } => "forwarding_failure",
            RouteError::ForwardingTimeout { .. } => "forwarding_timeout",
        }
    }
}
