use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;
use crate::load_balancer::{Algorithm, BackendView, BalancerError, LoadBalancer};
use crate::registry::{BackendDescriptor, RegistryError};
use crate::routing::{AnalyticsSummary, InMemoryAnalytics};

#[derive(Clone)]
pub struct AdminState {
    pub balancer: Arc<LoadBalancer>,
    pub analytics: Arc<InMemoryAnalytics>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub algorithm: Algorithm,
    pub total_backends: usize,
    pub healthy_backends: usize,
    pub health_generation: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlgorithmBody {
    pub algorithm: String,
}

/// Replacement fields for an existing backend.
#[derive(Debug, Deserialize)]
pub struct BackendUpdate {
    pub address: String,
    #[serde(default)]
    pub specialization: Option<String>,
    #[serde(default)]
    pub security_level: Option<u8>,
}

/// Balancer errors rendered for admin callers.
pub struct AdminError(BalancerError);

impl From<BalancerError> for AdminError {
    fn from(e: BalancerError) -> Self {
        Self(e)
    }
}

impl From<RegistryError> for AdminError {
    fn from(e: RegistryError) -> Self {
        Self(BalancerError::Registry(e))
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            BalancerError::InvalidAlgorithm(_) => StatusCode::BAD_REQUEST,
            BalancerError::Registry(RegistryError::InvalidAddress { .. }) => StatusCode::BAD_REQUEST,
            BalancerError::Registry(RegistryError::DuplicateBackend(_)) => StatusCode::CONFLICT,
            BalancerError::Registry(RegistryError::UnknownBackend(_)) => StatusCode::NOT_FOUND,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let table = state.balancer.monitor().table();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        algorithm: state.balancer.algorithm(),
        total_backends: state.balancer.registry().len(),
        healthy_backends: state.balancer.healthy_candidates().len(),
        health_generation: table.generation,
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendView>> {
    Json(state.balancer.backends())
}

pub async fn register_backend(
    State(state): State<AdminState>,
    Json(config): Json<BackendConfig>,
) -> Result<(StatusCode, Json<BackendDescriptor>), AdminError> {
    let descriptor = state
        .balancer
        .register(BackendDescriptor::from_config(&config)?)?;
    Ok((StatusCode::CREATED, Json(BackendDescriptor::clone(&descriptor))))
}

pub async fn update_backend(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(update): Json<BackendUpdate>,
) -> Result<Json<BackendDescriptor>, AdminError> {
    let config = BackendConfig {
        id,
        address: update.address,
        specialization: update.specialization,
        security_level: update.security_level,
    };
    let descriptor = state.balancer.update(BackendDescriptor::from_config(&config)?)?;
    Ok(Json(BackendDescriptor::clone(&descriptor)))
}

pub async fn deregister_backend(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AdminError> {
    state.balancer.deregister(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_algorithm(State(state): State<AdminState>) -> Json<AlgorithmBody> {
    Json(AlgorithmBody {
        algorithm: state.balancer.algorithm().to_string(),
    })
}

pub async fn set_algorithm(
    State(state): State<AdminState>,
    Json(body): Json<AlgorithmBody>,
) -> Result<Json<AlgorithmBody>, AdminError> {
    let algorithm = state.balancer.set_algorithm(&body.algorithm)?;
    Ok(Json(AlgorithmBody {
        algorithm: algorithm.to_string(),
    }))
}

pub async fn get_analytics(State(state): State<AdminState>) -> Json<AnalyticsSummary> {
    Json(state.analytics.summary())
}
