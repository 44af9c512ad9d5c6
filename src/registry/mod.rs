//! Backend registry subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (config, admin API, hot reload):
//!     BackendDescriptor
//!     → pool.rs (ServerRegistry, ordered, ids unique)
//!     → published as an immutable snapshot
//!
//! Stats refresh (background):
//!     stats.rs (StatsProvider, one fetch per backend, concurrent)
//!     → pool.rs overwrites RuntimeStats wholesale
//!     → failed fetch keeps the previous value, flagged stale
//! ```
//!
//! # Design Decisions
//! - Readers never lock: the roster is an `ArcSwap` snapshot
//! - Writers are serialized and publish a whole new roster
//! - Registration order is preserved (tie-breaks depend on it)

pub mod backend;
pub mod pool;
pub mod stats;

use thiserror::Error;

pub use backend::{unix_millis, BackendDescriptor, RuntimeStats};
pub use pool::{RefreshSummary, RegistryEntry, ServerRegistry};
pub use stats::{HttpStatsProvider, StatsError, StatsProvider};

/// Errors raised by roster changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("backend '{0}' is already registered")]
    DuplicateBackend(String),

    #[error("backend '{0}' is not registered")]
    UnknownBackend(String),

    #[error("backend '{id}' has an invalid address: {reason}")]
    InvalidAddress { id: String, reason: String },
}
