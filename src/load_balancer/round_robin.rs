//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::scheduler::{Candidate, SelectionContext, SelectionStrategy};

/// Round-robin selector.
/// Stores an internal counter to rotate through the healthy set.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for RoundRobin {
    fn select<'a>(
        &self,
        candidates: &'a [Candidate],
        _ctx: &SelectionContext<'_>,
    ) -> Option<&'a Candidate> {
        if candidates.is_empty() {
            return None;
        }

        // The healthy set may shrink between calls; wrap against its current length.
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates.get(index)
    }
}
