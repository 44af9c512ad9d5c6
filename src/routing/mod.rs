//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path, headers, body)
//!     → router.rs (refuse early without healthy backends)
//!     → context.rs + matcher.rs (classification, user context)
//!     → collaborators.rs (predictor, when the algorithm wants one)
//!     → load_balancer (select)
//!     → forward.rs (rewrite, send, buffer response)
//!     → history + analytics
//! ```
//!
//! # Design Decisions
//! - Classification rules compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - First matching rule wins (ordered by priority)

pub mod collaborators;
pub mod context;
pub mod error;
pub mod forward;
pub mod matcher;
pub mod router;

pub use collaborators::{
    Analytics, AnalyticsSummary, BackendUsage, CacheOptimizer, CollaboratorError,
    InMemoryAnalytics, NoopCacheOptimizer, PerformanceMetric, Predictor, PredictorOutput,
    RoutingDecision,
};
pub use context::{ContentAnalyzer, ContentInfo, RuleAnalyzer, UserInfo};
pub use error::RouteError;
pub use forward::Forwarder;
pub use router::RequestRouter;
