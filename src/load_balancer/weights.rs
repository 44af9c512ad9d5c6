//! Routing weight computation.
//!
//! ```text
//! weight = (mean load across healthy / own load, or 1 when zero) × performance factor
//! performance factor = 1000 / (mean of last N latencies in ms + 1), or 1 without samples
//! ```
//! Unhealthy backends weigh 0. With no healthy backend the map is empty.

use std::collections::HashMap;

use crate::health::HealthState;
use crate::load_balancer::history::PerformanceHistory;

/// Weight per backend id.
pub type WeightMap = HashMap<String, f64>;

/// Derives weights from health, load and recent latency.
#[derive(Debug, Clone, Copy)]
pub struct WeightEngine {
    sample_window: usize,
}

impl WeightEngine {
    pub fn new(sample_window: usize) -> Self {
        Self {
            sample_window: sample_window.max(1),
        }
    }

    pub fn sample_window(&self) -> usize {
        self.sample_window
    }

    pub fn performance_factor(&self, id: &str, history: &PerformanceHistory) -> f64 {
        history
            .recent_mean(id, self.sample_window)
            .map(|mean| 1000.0 / (mean + 1.0))
            .unwrap_or(1.0)
    }

    /// Compute the weight of every backend in `states`.
    pub fn recompute(
        &self,
        states: &HashMap<String, HealthState>,
        history: &PerformanceHistory,
    ) -> WeightMap {
        let healthy: Vec<&HealthState> = states.values().filter(|s| s.is_healthy()).collect();
        if healthy.is_empty() {
            return WeightMap::new();
        }

        // Backends not yet probed count as idle.
        let total_load: f64 = healthy.iter().map(|s| s.load.unwrap_or(0.0)).sum();
        let mean_load = total_load / healthy.len() as f64;
        let mean_load = if mean_load > 0.0 { mean_load } else { 1.0 };

        states
            .iter()
            .map(|(id, state)| {
                let weight = if state.is_healthy() {
                    let own_load = state.load.filter(|l| *l > 0.0).unwrap_or(1.0);
                    (mean_load / own_load) * self.performance_factor(id, history)
                } else {
                    0.0
                };
                (id.clone(), weight)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{HealthStatus, ProbeReport, Thresholds};
    use std::time::Duration;

    fn state(load: f64) -> HealthState {
        let mut state = HealthState::new();
        state.record_success(
            &ProbeReport {
                load,
                active_connections: None,
                specialization: None,
            },
            Thresholds::default(),
        );
        state
    }

    fn unhealthy() -> HealthState {
        let mut state = state(50.0);
        state.status = HealthStatus::Unhealthy;
        state
    }

    #[test]
    fn test_lower_load_gets_higher_weight() {
        let history = PerformanceHistory::new(100);
        let states = HashMap::from([
            ("a".to_string(), state(10.0)),
            ("b".to_string(), state(90.0)),
            ("c".to_string(), unhealthy()),
        ]);

        let weights = WeightEngine::new(100).recompute(&states, &history);
        // mean load over healthy = 50
        assert!((weights["a"] - 5.0).abs() < 1e-9);
        assert!((weights["b"] - 50.0 / 90.0).abs() < 1e-9);
        assert_eq!(weights["c"], 0.0);
    }

    #[test]
    fn test_latency_scales_weight() {
        let history = PerformanceHistory::new(100);
        history.track("fast");
        history.track("slow");
        history.record("fast", Duration::from_millis(9));
        history.record("slow", Duration::from_millis(999));

        let states = HashMap::from([
            ("fast".to_string(), state(50.0)),
            ("slow".to_string(), state(50.0)),
        ]);
        let weights = WeightEngine::new(100).recompute(&states, &history);
        assert!((weights["fast"] - 100.0).abs() < 1e-6);
        assert!((weights["slow"] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_load_counts_as_one() {
        let history = PerformanceHistory::new(100);
        let states = HashMap::from([
            ("idle".to_string(), state(0.0)),
            ("new".to_string(), HealthState::new()),
        ]);
        let weights = WeightEngine::new(100).recompute(&states, &history);
        assert_eq!(weights["idle"], 1.0);
        assert_eq!(weights["new"], 1.0);
    }

    #[test]
    fn test_no_healthy_backends_yields_empty_map() {
        let history = PerformanceHistory::new(100);
        let states = HashMap::from([("c".to_string(), unhealthy())]);
        assert!(WeightEngine::new(100).recompute(&states, &history).is_empty());
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let history = PerformanceHistory::new(100);
        history.track("a");
        history.record("a", Duration::from_millis(42));
        let states = HashMap::from([
            ("a".to_string(), state(30.0)),
            ("b".to_string(), state(70.0)),
            ("c".to_string(), unhealthy()),
        ]);

        let engine = WeightEngine::new(100);
        assert_eq!(engine.recompute(&states, &history), engine.recompute(&states, &history));
    }
}
