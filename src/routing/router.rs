//! Request routing.
//!
//! # Responsibilities
//! - Refuse early when no backend is healthy
//! - Derive request context and consult the predictor when needed
//! - Select a backend, forward, and record the outcome
//!
//! # Design Decisions
//! - Collaborators are best-effort; their failures are logged, never returned
//! - Predictor and cache optimizer calls are bounded by `collaborator_timeout_ms`
//! - A missing, failing or slow predictor degrades to least connections
//! - Latency is recorded only for completed exchanges

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use tokio::time;

use crate::config::{ClassificationRule, ForwardingConfig};
use crate::load_balancer::{Algorithm, Candidate, LoadBalancer, SelectionContext};
use crate::observability::metrics;
use crate::registry::unix_millis;
use crate::routing::collaborators::{
    Analytics, CacheOptimizer, NoopCacheOptimizer, PerformanceMetric, Predictor,
    PredictorOutput, RoutingDecision,
};
use crate::routing::context::{ContentAnalyzer, ContentInfo, RuleAnalyzer, UserInfo};
use crate::routing::error::RouteError;
use crate::routing::forward::Forwarder;

pub struct RequestRouter {
    balancer: Arc<LoadBalancer>,
    forwarder: Forwarder,
    analyzer: Arc<dyn ContentAnalyzer>,
    predictor: Option<Arc<dyn Predictor>>,
    cache_optimizer: Arc<dyn CacheOptimizer>,
    analytics: Option<Arc<dyn Analytics>>,
    max_body_bytes: usize,
    collaborator_timeout: Duration,
}

impl RequestRouter {
    pub fn new(
        balancer: Arc<LoadBalancer>,
        forwarding: &ForwardingConfig,
        rules: &[ClassificationRule],
    ) -> Self {
        Self {
            balancer,
            forwarder: Forwarder::new(forwarding),
            analyzer: Arc::new(RuleAnalyzer::new(rules)),
            predictor: None,
            cache_optimizer: Arc::new(NoopCacheOptimizer),
            analytics: None,
            max_body_bytes: forwarding.max_body_bytes,
            collaborator_timeout: Duration::from_millis(forwarding.collaborator_timeout_ms),
        }
    }

    pub fn with_predictor(mut self, predictor: Arc<dyn Predictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_cache_optimizer(mut self, optimizer: Arc<dyn CacheOptimizer>) -> Self {
        self.cache_optimizer = optimizer;
        self
    }

    pub fn with_analytics(mut self, analytics: Arc<dyn Analytics>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    pub fn with_content_analyzer(mut self, analyzer: Arc<dyn ContentAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn balancer(&self) -> &Arc<LoadBalancer> {
        &self.balancer
    }

    /// Route one request to a healthy backend and return its response.
    pub async fn route(
        &self,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
        request_id: &str,
    ) -> Result<Response<Body>, RouteError> {
        let started = Instant::now();
        let result = self.dispatch(request, client_addr, request_id, started).await;

        if let Err(e) = &result {
            metrics::record_routing_error(e.kind());
            self.record_metric(PerformanceMetric {
                timestamp_ms: unix_millis(),
                backend_id: e.backend_id().map(str::to_string),
                response_time_ms: started.elapsed().as_secs_f64() * 1000.0,
                error: true,
            });
        }
        result
    }

    async fn dispatch(
        &self,
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
        request_id: &str,
        started: Instant,
    ) -> Result<Response<Body>, RouteError> {
        let (parts, body) = request.into_parts();

        let candidates = self.balancer.healthy_candidates();
        if candidates.is_empty() {
            tracing::error!(request_id = %request_id, "No healthy backends available for routing");
            return Err(RouteError::NoHealthyBackends {
                request_id: request_id.to_string(),
            });
        }

        let declared_length = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared_length.is_some_and(|len| len > self.max_body_bytes as u64) {
            return Err(RouteError::InvalidRequest {
                request_id: request_id.to_string(),
                reason: format!("request body exceeds {} bytes", self.max_body_bytes),
                status: StatusCode::PAYLOAD_TOO_LARGE,
            });
        }
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|e| RouteError::InvalidRequest {
                request_id: request_id.to_string(),
                reason: format!("failed to read request body: {}", e),
                status: StatusCode::BAD_REQUEST,
            })?;

        let content = self.analyzer.content_info(&parts);
        let user = self.analyzer.user_info(&parts, client_addr);

        let (algorithm, prediction) = match self.balancer.algorithm() {
            Algorithm::PredictorAssisted => {
                match self.predict(&content, &candidates, &user, request_id).await {
                    Some(output) => (Algorithm::PredictorAssisted, Some(output)),
                    None => (Algorithm::LeastConnections, None),
                }
            }
            other => (other, None),
        };

        let ctx = SelectionContext {
            content: &content,
            prediction: prediction.as_ref(),
        };
        let backend = self
            .balancer
            .select(algorithm, &candidates, &ctx)
            .map_err(|_| RouteError::NoAvailableBackend {
                request_id: request_id.to_string(),
            })?
            .descriptor
            .clone();

        tracing::debug!(
            request_id = %request_id,
            backend_id = %backend.id,
            algorithm = %algorithm,
            classification = %content.classification,
            "Backend selected"
        );

        match time::timeout(
            self.collaborator_timeout,
            self.cache_optimizer.optimize(&user, &content),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(request_id = %request_id, error = %e, "Cache optimization failed")
            }
            Err(_) => tracing::warn!(
                request_id = %request_id,
                timeout_ms = self.collaborator_timeout.as_millis() as u64,
                "Cache optimization timed out, skipping"
            ),
        }

        let outcome = self.forwarder.forward(parts, body, &backend, request_id).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(response) => {
                self.balancer.record_latency(&backend.id, elapsed);
                metrics::record_request(&content.method, response.status().as_u16(), &backend.id, started);
                self.record_decision(RoutingDecision {
                    timestamp_ms: unix_millis(),
                    request_id: request_id.to_string(),
                    method: content.method.clone(),
                    path: content.path.clone(),
                    backend_id: backend.id.clone(),
                    algorithm,
                    predictor_scores: prediction.map(|p| p.server_selection),
                });
                self.record_metric(PerformanceMetric {
                    timestamp_ms: unix_millis(),
                    backend_id: Some(backend.id.clone()),
                    response_time_ms: elapsed.as_secs_f64() * 1000.0,
                    error: false,
                });
                Ok(response)
            }
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    backend_id = %backend.id,
                    error = %e,
                    "Upstream error"
                );
                metrics::record_request(&content.method, e.status().as_u16(), &backend.id, started);
                Err(e)
            }
        }
    }

    async fn predict(
        &self,
        content: &ContentInfo,
        candidates: &[Candidate],
        user: &UserInfo,
        request_id: &str,
    ) -> Option<PredictorOutput> {
        let Some(predictor) = &self.predictor else {
            tracing::warn!(request_id = %request_id, "No predictor configured, using least connections");
            return None;
        };

        let prediction = time::timeout(
            self.collaborator_timeout,
            predictor.predict(content, candidates, user),
        )
        .await;
        let Ok(prediction) = prediction else {
            tracing::warn!(
                request_id = %request_id,
                timeout_ms = self.collaborator_timeout.as_millis() as u64,
                "Predictor timed out, using least connections"
            );
            return None;
        };

        match prediction {
            Ok(output) => {
                if output.is_anomaly {
                    tracing::warn!(request_id = %request_id, "Anomaly detected in request");
                }
                Some(output)
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    "Predictor failed, using least connections"
                );
                None
            }
        }
    }

    fn record_decision(&self, decision: RoutingDecision) {
        if let Some(analytics) = &self.analytics {
            if let Err(e) = analytics.record_routing_decision(decision) {
                tracing::warn!(error = %e, "Failed to record routing decision");
            }
        }
    }

    fn record_metric(&self, metric: PerformanceMetric) {
        if let Some(analytics) = &self.analytics {
            if let Err(e) = analytics.record_performance_metric(metric) {
                tracing::warn!(error = %e, "Failed to record performance metric");
            }
        }
    }
}
