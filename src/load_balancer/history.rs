//! Per-backend forwarding latency history.
//!
//! # Responsibilities
//! - Keep a bounded, append-only window of latencies per backend
//! - Evict the oldest sample once the cap is reached
//! - Answer "mean of the last N samples" for the weight engine

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;

/// Bounded latency samples, in milliseconds, keyed by backend id.
#[derive(Debug)]
pub struct PerformanceHistory {
    samples: DashMap<String, VecDeque<f64>>,
    capacity: usize,
}

impl PerformanceHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Create an empty history for a registered backend.
    pub fn track(&self, id: &str) {
        self.samples.entry(id.to_string()).or_default();
    }

    pub fn untrack(&self, id: &str) {
        self.samples.remove(id);
    }

    /// Append a latency sample. Returns false for untracked backends.
    pub fn record(&self, id: &str, latency: Duration) -> bool {
        let Some(mut window) = self.samples.get_mut(id) else {
            return false;
        };
        if window.len() >= self.capacity {
            window.pop_front();
        }
        window.push_back(latency.as_secs_f64() * 1000.0);
        true
    }

    pub fn len(&self, id: &str) -> usize {
        self.samples.get(id).map(|w| w.len()).unwrap_or(0)
    }

    /// All samples for a backend, oldest first.
    pub fn samples(&self, id: &str) -> Vec<f64> {
        self.samples
            .get(id)
            .map(|w| w.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Mean of the most recent `window` samples, `None` without samples.
    pub fn recent_mean(&self, id: &str, window: usize) -> Option<f64> {
        let samples = self.samples.get(id)?;
        let take = window.min(samples.len());
        if take == 0 {
            return None;
        }
        let sum: f64 = samples.iter().rev().take(take).sum();
        Some(sum / take as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_1001_evicts_oldest() {
        let history = PerformanceHistory::new(1000);
        history.track("a");
        for ms in 0..1000u64 {
            assert!(history.record("a", Duration::from_millis(ms)));
        }
        assert_eq!(history.len("a"), 1000);

        history.record("a", Duration::from_millis(5000));
        let samples = history.samples("a");
        assert_eq!(samples.len(), 1000);
        assert_eq!(samples[0], 1.0);
        assert_eq!(samples[999], 5000.0);
    }

    #[test]
    fn test_recent_mean_uses_window() {
        let history = PerformanceHistory::new(10);
        history.track("a");
        assert_eq!(history.recent_mean("a", 3), None);

        for ms in [100, 100, 10, 20, 30] {
            history.record("a", Duration::from_millis(ms));
        }
        assert_eq!(history.recent_mean("a", 3), Some(20.0));
        assert_eq!(history.recent_mean("a", 100), Some(52.0));
    }

    #[test]
    fn test_untracked_backend_is_ignored() {
        let history = PerformanceHistory::new(10);
        assert!(!history.record("ghost", Duration::from_millis(5)));
        assert_eq!(history.len("ghost"), 0);

        history.track("a");
        history.record("a", Duration::from_millis(5));
        history.track("a");
        assert_eq!(history.len("a"), 1, "re-tracking keeps samples");
        history.untrack("a");
        assert_eq!(history.recent_mean("a", 10), None);
    }
}
