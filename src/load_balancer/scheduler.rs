//! Strategy selection.
//!
//! # Responsibilities
//! - Hold the active algorithm, switchable at runtime
//! - Dispatch a selection to the matching strategy
//! - Turn an empty pick into `NoAvailableBackend`

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::load_balancer::least_conn::LeastConnections;
use crate::load_balancer::predictive::PredictorAssisted;
use crate::load_balancer::round_robin::RoundRobin;
use crate::load_balancer::weighted::WeightedRoundRobin;
use crate::load_balancer::BalancerError;
use crate::registry::BackendDescriptor;
use crate::routing::{ContentInfo, PredictorOutput};

/// Selection algorithm.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "round-robin")]
    RoundRobin = 0,
    #[default]
    #[serde(rename = "weighted-round-robin")]
    WeightedRoundRobin = 1,
    #[serde(rename = "least-connections")]
    LeastConnections = 2,
    #[serde(rename = "ml-optimized", alias = "predictor-assisted")]
    PredictorAssisted = 3,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::RoundRobin,
        Algorithm::WeightedRoundRobin,
        Algorithm::LeastConnections,
        Algorithm::PredictorAssisted,
    ];

    /// Canonical name, as accepted by configuration and the admin API.
    pub fn name(self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round-robin",
            Algorithm::WeightedRoundRobin => "weighted-round-robin",
            Algorithm::LeastConnections => "least-connections",
            Algorithm::PredictorAssisted => "ml-optimized",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Algorithm::RoundRobin,
            2 => Algorithm::LeastConnections,
            3 => Algorithm::PredictorAssisted,
            _ => Algorithm::WeightedRoundRobin,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = BalancerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round-robin" => Ok(Algorithm::RoundRobin),
            "weighted-round-robin" => Ok(Algorithm::WeightedRoundRobin),
            "least-connections" => Ok(Algorithm::LeastConnections),
            "ml-optimized" | "predictor-assisted" => Ok(Algorithm::PredictorAssisted),
            _ => Err(BalancerError::InvalidAlgorithm(s.to_string())),
        }
    }
}

/// A healthy backend as seen by a strategy.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub descriptor: Arc<BackendDescriptor>,
    pub weight: f64,
    /// Load in [0, 100] from the last probe or stats refresh.
    pub load: Option<f64>,
    pub active_connections: Option<u64>,
    pub specialization: Option<String>,
}

impl Candidate {
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }
}

/// Request facts available to a strategy.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub content: &'a ContentInfo,
    /// Predictor output, when one was obtained for this request.
    pub prediction: Option<&'a PredictorOutput>,
}

/// A backend selection algorithm over healthy candidates.
pub trait SelectionStrategy: Send + Sync + fmt::Debug {
    /// Pick one candidate. `None` only when `candidates` is empty.
    fn select<'a>(
        &self,
        candidates: &'a [Candidate],
        ctx: &SelectionContext<'_>,
    ) -> Option<&'a Candidate>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no available backend")]
pub struct NoAvailableBackend;

/// Owns one instance of every strategy plus the active choice.
#[derive(Debug)]
pub struct Scheduler {
    active: AtomicU8,
    round_robin: RoundRobin,
    weighted: WeightedRoundRobin,
    least_conn: LeastConnections,
    predictive: PredictorAssisted,
}

impl Scheduler {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            active: AtomicU8::new(algorithm as u8),
            round_robin: RoundRobin::new(),
            weighted: WeightedRoundRobin::new(),
            least_conn: LeastConnections::new(),
            predictive: PredictorAssisted::new(),
        }
    }

    /// Replace the weighted strategy, e.g. with a seeded one.
    pub fn with_weighted(mut self, weighted: WeightedRoundRobin) -> Self {
        self.weighted = weighted;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        Algorithm::from_u8(self.active.load(Ordering::Acquire))
    }

    pub fn set(&self, algorithm: Algorithm) {
        let previous = Algorithm::from_u8(self.active.swap(algorithm as u8, Ordering::AcqRel));
        if previous != algorithm {
            tracing::info!(from = %previous, to = %algorithm, "Load balancing algorithm changed");
        }
    }

    /// Switch by name. An unknown name leaves the active algorithm unchanged.
    pub fn set_algorithm(&self, name: &str) -> Result<Algorithm, BalancerError> {
        let algorithm = Algorithm::from_str(name)?;
        self.set(algorithm);
        Ok(algorithm)
    }

    pub fn strategy(&self, algorithm: Algorithm) -> &dyn SelectionStrategy {
        match algorithm {
            Algorithm::RoundRobin => &self.round_robin,
            Algorithm::WeightedRoundRobin => &self.weighted,
            Algorithm::LeastConnections => &self.least_conn,
            Algorithm::PredictorAssisted => &self.predictive,
        }
    }

    pub fn select<'a>(
        &self,
        algorithm: Algorithm,
        candidates: &'a [Candidate],
        ctx: &SelectionContext<'_>,
    ) -> Result<&'a Candidate, NoAvailableBackend> {
        self.strategy(algorithm)
            .select(candidates, ctx)
            .ok_or(NoAvailableBackend)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Algorithm::default())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn candidate(id: &str, weight: f64, load: Option<f64>, connections: Option<u64>) -> Candidate {
        let port = 3000 + id.bytes().map(u16::from).sum::<u16>();
        Candidate {
            descriptor: Arc::new(
                BackendDescriptor::new(id, &format!("http://127.0.0.1:{}", port)).unwrap(),
            ),
            weight,
            load,
            active_connections: connections,
            specialization: None,
        }
    }

    pub fn content(classification: &str) -> ContentInfo {
        ContentInfo {
            classification: classification.to_string(),
            ..ContentInfo::default()
        }
    }
}
