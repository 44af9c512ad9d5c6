//! External collaborators consulted while routing.
//!
//! None of them may fail a request: errors are logged and routing
//! carries on without them.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::load_balancer::{Algorithm, Candidate};
use crate::routing::context::{ContentInfo, UserInfo};

/// Default ring size for [`InMemoryAnalytics`].
pub const DEFAULT_ANALYTICS_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("collaborator failed: {0}")]
    Failed(String),

    #[error("collaborator '{0}' is unavailable")]
    Unavailable(String),
}

/// Routing hints from a scoring service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictorOutput {
    pub traffic_prediction: f64,
    /// One score per candidate, in candidate order.
    pub server_selection: Vec<f64>,
    #[serde(default)]
    pub user_behavior: serde_json::Value,
    pub content_popularity: f64,
    pub is_anomaly: bool,
}

#[async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(
        &self,
        content: &ContentInfo,
        candidates: &[Candidate],
        user: &UserInfo,
    ) -> Result<PredictorOutput, CollaboratorError>;
}

#[async_trait]
pub trait CacheOptimizer: Send + Sync {
    async fn optimize(&self, user: &UserInfo, content: &ContentInfo) -> Result<(), CollaboratorError>;
}

/// Does nothing.
#[derive(Debug, Default)]
pub struct NoopCacheOptimizer;

#[async_trait]
impl CacheOptimizer for NoopCacheOptimizer {
    async fn optimize(&self, _user: &UserInfo, _content: &ContentInfo) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// One routing choice, recorded once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub timestamp_ms: u64,
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub backend_id: String,
    pub algorithm: Algorithm,
    pub predictor_scores: Option<Vec<f64>>,
}

/// Outcome of one routed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    pub timestamp_ms: u64,
    pub backend_id: Option<String>,
    pub response_time_ms: f64,
    pub error: bool,
}

/// Sink for routing outcomes. Implementations must not block.
pub trait Analytics: Send + Sync {
    fn record_routing_decision(&self, decision: RoutingDecision) -> Result<(), CollaboratorError>;

    fn record_performance_metric(&self, metric: PerformanceMetric) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendUsage {
    pub backend_id: String,
    pub usage_count: usize,
    pub usage_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub backend_usage: Vec<BackendUsage>,
    pub average_response_time_ms: Option<f64>,
    /// Percentage of recorded requests that failed.
    pub error_rate: Option<f64>,
    pub total_requests: usize,
}

/// Keeps the most recent decisions and metrics in memory.
#[derive(Debug)]
pub struct InMemoryAnalytics {
    decisions: Mutex<VecDeque<RoutingDecision>>,
    metrics: Mutex<VecDeque<PerformanceMetric>>,
    capacity: usize,
}

impl Default for InMemoryAnalytics {
    fn default() -> Self {
        Self::new(DEFAULT_ANALYTICS_CAPACITY)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn push_bounded<T>(ring: &mut VecDeque<T>, item: T, capacity: usize) {
    if ring.len() >= capacity {
        ring.pop_front();
    }
    ring.push_back(item);
}

impl InMemoryAnalytics {
    pub fn new(capacity: usize) -> Self {
        Self {
            decisions: Mutex::new(VecDeque::new()),
            metrics: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn decisions(&self) -> Vec<RoutingDecision> {
        lock(&self.decisions).iter().cloned().collect()
    }

    pub fn metrics(&self) -> Vec<PerformanceMetric> {
        lock(&self.metrics).iter().cloned().collect()
    }

    pub fn summary(&self) -> AnalyticsSummary {
        let decisions = lock(&self.decisions);
        let mut usage: BTreeMap<&str, usize> = BTreeMap::new();
        for decision in decisions.iter() {
            *usage.entry(decision.backend_id.as_str()).or_insert(0) += 1;
        }
        let total_decisions = decisions.len();
        let backend_usage = usage
            .into_iter()
            .map(|(backend_id, usage_count)| BackendUsage {
                backend_id: backend_id.to_string(),
                usage_count,
                usage_percentage: usage_count as f64 / total_decisions as f64 * 100.0,
            })
            .collect();
        drop(decisions);

        let metrics = lock(&self.metrics);
        let total_requests = metrics.len();
        let (average_response_time_ms, error_rate) = if total_requests == 0 {
            (None, None)
        } else {
            let total_time: f64 = metrics.iter().map(|m| m.response_time_ms).sum();
            let errors = metrics.iter().filter(|m| m.error).count();
            (
                Some(total_time / total_requests as f64),
                Some(errors as f64 / total_requests as f64 * 100.0),
            )
        };

        AnalyticsSummary {
            backend_usage,
            average_response_time_ms,
            error_rate,
            total_requests,
        }
    }
}

impl Analytics for InMemoryAnalytics {
    fn record_routing_decision(&self, decision: RoutingDecision) -> Result<(), CollaboratorError> {
        push_bounded(&mut lock(&self.decisions), decision, self.capacity);
        Ok(())
    }

    fn record_performance_metric(&self, metric: PerformanceMetric) -> Result<(), CollaboratorError> {
        push_bounded(&mut lock(&self.metrics), metric, self.capacity);
        Ok(())
    }
}
