//! Backend health state machine.
//!
//! # States
//! - Healthy: backend receives traffic
//! - Unhealthy: backend excluded from load balancing
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= failure_threshold
//! Unhealthy → Healthy: consecutive successes >= success_threshold
//! ```
//!
//! Every probe outcome updates the counters; an outcome resets the
//! opposite counter to zero. Backends start Healthy.

use serde::Serialize;

use crate::health::probe::ProbeReport;
use crate::registry::unix_millis;

/// Routing status of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Hysteresis thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub failure: u32,
    pub success: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            failure: 3,
            success: 2,
        }
    }
}

/// A status change caused by a probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameHealthy,
    BecameUnhealthy,
}

/// Per-backend health record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthState {
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_checked_at_ms: Option<u64>,
    /// Load from the last successful probe body.
    pub load: Option<f64>,
    pub active_connections: Option<u64>,
    pub specialization: Option<String>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            status: HealthStatus::Healthy,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_checked_at_ms: None,
            load: None,
            active_connections: None,
            specialization: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Apply a successful probe.
    pub fn record_success(&mut self, report: &ProbeReport, thresholds: Thresholds) -> Option<Transition> {
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
        self.last_checked_at_ms = Some(unix_millis());
        self.load = Some(report.load);
        self.active_connections = report.active_connections;
        self.specialization = report.specialization.clone();

        if self.status == HealthStatus::Unhealthy && self.consecutive_successes >= thresholds.success {
            self.status = HealthStatus::Healthy;
            return Some(Transition::BecameHealthy);
        }
        None
    }

    /// Apply a failed probe. Last-observed load data is kept.
    pub fn record_failure(&mut self, thresholds: Thresholds) -> Option<Transition> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
        self.last_checked_at_ms = Some(unix_millis());

        if self.status == HealthStatus::Healthy && self.consecutive_failures >= thresholds.failure {
            self.status = HealthStatus::Unhealthy;
            return Some(Transition::BecameUnhealthy);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(load: f64) -> ProbeReport {
        ProbeReport {
            load,
            active_connections: Some(4),
            specialization: None,
        }
    }

    #[test]
    fn test_flips_unhealthy_after_exactly_failure_threshold() {
        let thresholds = Thresholds::default();
        let mut state = HealthState::new();

        assert_eq!(state.record_failure(thresholds), None);
        assert_eq!(state.record_failure(thresholds), None);
        assert!(state.is_healthy());
        assert_eq!(state.record_failure(thresholds), Some(Transition::BecameUnhealthy));
        assert!(!state.is_healthy());

        // Further failures count but do not transition again.
        assert_eq!(state.record_failure(thresholds), None);
        assert_eq!(state.consecutive_failures, 4);
    }

    #[test]
    fn test_recovers_after_exactly_success_threshold() {
        let thresholds = Thresholds::default();
        let mut state = HealthState::new();
        for _ in 0..3 {
            state.record_failure(thresholds);
        }

        assert_eq!(state.record_success(&report(10.0), thresholds), None);
        assert!(!state.is_healthy());
        assert_eq!(
            state.record_success(&report(10.0), thresholds),
            Some(Transition::BecameHealthy)
        );
        assert!(state.is_healthy());
        assert_eq!(state.load, Some(10.0));
    }

    #[test]
    fn test_opposite_outcome_resets_counter() {
        let thresholds = Thresholds::default();
        let mut state = HealthState::new();

        state.record_failure(thresholds);
        state.record_failure(thresholds);
        state.record_success(&report(5.0), thresholds);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.consecutive_successes, 1);

        // Two more failures are not enough: the streak restarted.
        state.record_failure(thresholds);
        state.record_failure(thresholds);
        assert!(state.is_healthy());
        assert_eq!(state.consecutive_successes, 0);
        state.record_failure(thresholds);
        assert!(!state.is_healthy());

        // A failure interrupts recovery as well.
        state.record_success(&report(5.0), thresholds);
        state.record_failure(thresholds);
        state.record_success(&report(5.0), thresholds);
        assert!(!state.is_healthy());
        state.record_success(&report(5.0), thresholds);
        assert!(state.is_healthy());
    }

    #[test]
    fn test_failure_keeps_last_observed_load() {
        let thresholds = Thresholds::default();
        let mut state = HealthState::new();
        state.record_success(&report(42.0), thresholds);
        state.record_failure(thresholds);
        assert_eq!(state.load, Some(42.0));
        assert_eq!(state.active_connections, Some(4));
    }
}
