//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, all errors collected)
//!     → BalancerConfig (validated, immutable)
//!     → consumed at startup by the balancer and HTTP server
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → update sent to the server, which switches the algorithm
//!       and reconciles the backend roster
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BackendConfig, BalancerConfig, ClassificationRule, ForwardingConfig,
    HealthCheckConfig, ListenerConfig, ObservabilityConfig, StatsConfig, StrategyConfig,
};
pub use validation::ValidationError;
