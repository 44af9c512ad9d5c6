//! Weighted random load balancing strategy.

use std::sync::{Mutex, PoisonError};

use crate::load_balancer::scheduler::{Candidate, SelectionContext, SelectionStrategy};

/// Weighted selector.
/// Draws `r` uniformly in `[0, total)` and walks the candidates,
/// subtracting each weight until `r` drops to zero or below.
#[derive(Debug)]
pub struct WeightedRoundRobin {
    rng: Mutex<fastrand::Rng>,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Deterministic draws for reproducible distributions.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    fn draw(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .f64()
    }
}

impl Default for WeightedRoundRobin {
    fn default() -> Self {
        Self::new()
    }
}

fn usable(weight: f64) -> bool {
    weight.is_finite() && weight > 0.0
}

impl SelectionStrategy for WeightedRoundRobin {
    fn select<'a>(
        &self,
        candidates: &'a [Candidate],
        _ctx: &SelectionContext<'_>,
    ) -> Option<&'a Candidate> {
        if candidates.is_empty() {
            return None;
        }

        let total: f64 = candidates
            .iter()
            .map(|c| c.weight)
            .filter(|w| usable(*w))
            .sum();

        // No weights published yet: spread uniformly.
        if !usable(total) {
            let index = (self.draw() * candidates.len() as f64) as usize;
            return candidates.get(index.min(candidates.len() - 1));
        }

        let mut remainder = self.draw() * total;
        for candidate in candidates.iter().filter(|c| usable(c.weight)) {
            remainder -= candidate.weight;
            if remainder <= 0.0 {
                return Some(candidate);
            }
        }

        // Floating point drift left a sliver of `remainder`.
        candidates
            .iter()
            .rev()
            .find(|c| usable(c.weight))
            .or(candidates.last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::scheduler::testing::{candidate, content};
    use std::collections::HashMap;

    fn counts(lb: &WeightedRoundRobin, candidates: &[Candidate], trials: usize) -> HashMap<String, usize> {
        let info = content("unknown");
        let ctx = SelectionContext {
            content: &info,
            prediction: None,
        };
        let mut counts = HashMap::new();
        for _ in 0..trials {
            let picked = lb.select(candidates, &ctx).unwrap();
            *counts.entry(picked.id().to_string()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_share_is_proportional_to_raw_weight() {
        let candidates = vec![
            candidate("A", 10.0, Some(10.0), None),
            candidate("B", 90.0, Some(10.0), None),
        ];
        let counts = counts(&WeightedRoundRobin::with_seed(7), &candidates, 1000);

        let b = counts.get("B").copied().unwrap_or(0);
        let a = counts.get("A").copied().unwrap_or(0);
        assert_eq!(a + b, 1000);
        assert!((850..=950).contains(&b), "B picked {} times", b);
    }

    #[test]
    fn test_zero_weight_never_selected() {
        let candidates = vec![
            candidate("zero", 0.0, None, None),
            candidate("one", 1.0, None, None),
            candidate("nan", f64::NAN, None, None),
        ];
        let counts = counts(&WeightedRoundRobin::with_seed(11), &candidates, 500);
        assert_eq!(counts.get("one"), Some(&500));
    }

    #[test]
    fn test_all_zero_weights_pick_uniformly() {
        let candidates = vec![
            candidate("a", 0.0, None, None),
            candidate("b", 0.0, None, None),
        ];
        let counts = counts(&WeightedRoundRobin::with_seed(3), &candidates, 1000);
        assert!(counts["a"] > 350);
        assert!(counts["b"] > 350);
    }
}
