//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds, timeouts, history sizes > 0)
//! - Detect duplicate backend ids and unusable addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::BalancerConfig;
use crate::load_balancer::Algorithm;
use crate::registry::BackendDescriptor;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid load balancing algorithm '{0}'")]
    InvalidAlgorithm(String),

    #[error("duplicate backend id '{0}'")]
    DuplicateBackend(String),

    #[error("backend '{id}' has an invalid address: {reason}")]
    InvalidAddress { id: String, reason: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("classification rule '{0}' has an empty tag")]
    EmptyTag(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if Algorithm::from_str(&config.balancer.algorithm).is_err() {
        errors.push(ValidationError::InvalidAlgorithm(config.balancer.algorithm.clone()));
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend.id.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.id.clone()));
        }
        if let Err(e) = BackendDescriptor::from_config(backend) {
            errors.push(ValidationError::InvalidAddress {
                id: backend.id.clone(),
                reason: e.to_string(),
            });
        }
    }

    let positive = [
        ("balancer.max_performance_history", config.balancer.max_performance_history as u64),
        (
            "balancer.performance_history_sample_window",
            config.balancer.performance_history_sample_window as u64,
        ),
        ("health_check.interval_ms", config.health_check.interval_ms),
        ("health_check.timeout_ms", config.health_check.timeout_ms),
        ("health_check.failure_threshold", config.health_check.failure_threshold as u64),
        ("health_check.success_threshold", config.health_check.success_threshold as u64),
        ("forwarding.timeout_ms", config.forwarding.timeout_ms),
        (
            "forwarding.collaborator_timeout_ms",
            config.forwarding.collaborator_timeout_ms,
        ),
        ("stats.interval_ms", config.stats.interval_ms),
        ("stats.timeout_ms", config.stats.timeout_ms),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    for rule in &config.classification {
        if rule.tag.trim().is_empty() {
            errors.push(ValidationError::EmptyTag(rule.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
