//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives → manager.rs (healthy candidates + weights from one snapshot)
//!     → scheduler.rs (active algorithm):
//!         - round_robin.rs (rotate through healthy backends)
//!         - weighted.rs (weighted random draw)
//!         - least_conn.rs (pick backend with fewest connections)
//!         - predictive.rs (specialization, anomaly, predictor scores)
//!     → Forwarding latency → history.rs
//!     → Next health cycle → weights.rs
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless apart from a rotation cursor or RNG
//! - Unhealthy backends never reach a strategy
//! - The active algorithm is switchable at runtime without locks

pub mod history;
pub mod least_conn;
pub mod manager;
pub mod predictive;
pub mod round_robin;
pub mod scheduler;
pub mod weighted;
pub mod weights;

use thiserror::Error;

use crate::registry::RegistryError;

pub use history::PerformanceHistory;
pub use manager::{BackendView, LoadBalancer};
pub use scheduler::{
    Algorithm, Candidate, NoAvailableBackend, Scheduler, SelectionContext, SelectionStrategy,
};
pub use weighted::WeightedRoundRobin;
pub use weights::{WeightEngine, WeightMap};

/// Errors from roster and algorithm management.
#[derive(Debug, Error)]
pub enum BalancerError {
    #[error("invalid load balancing algorithm '{0}'")]
    InvalidAlgorithm(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
