//! Least Connections load balancing strategy.

use crate::load_balancer::scheduler::{Candidate, SelectionContext, SelectionStrategy};

/// Least connections selector.
/// Selects the candidate with the fewest reported active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }

    /// Unknown counts sort last. Ties go to the earliest registered.
    pub fn pick(candidates: &[Candidate]) -> Option<&Candidate> {
        candidates
            .iter()
            .min_by_key(|c| c.active_connections.unwrap_or(u64::MAX))
    }
}

impl SelectionStrategy for LeastConnections {
    fn select<'a>(
        &self,
        candidates: &'a [Candidate],
        _ctx: &SelectionContext<'_>,
    ) -> Option<&'a Candidate> {
        Self::pick(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::scheduler::testing::{candidate, content};

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let info = content("unknown");
        let ctx = SelectionContext {
            content: &info,
            prediction: None,
        };

        let candidates = vec![
            candidate("a", 1.0, None, Some(1)),
            candidate("b", 1.0, None, Some(0)),
        ];
        assert_eq!(lb.select(&candidates, &ctx).unwrap().id(), "b");

        let candidates = vec![
            candidate("a", 1.0, None, Some(1)),
            candidate("b", 1.0, None, Some(2)),
        ];
        assert_eq!(lb.select(&candidates, &ctx).unwrap().id(), "a");
    }

    #[test]
    fn test_tie_goes_to_first_registered() {
        let candidates = vec![
            candidate("x", 1.0, None, Some(4)),
            candidate("y", 1.0, None, Some(4)),
            candidate("z", 1.0, None, Some(4)),
        ];
        assert_eq!(LeastConnections::pick(&candidates).unwrap().id(), "x");
    }

    #[test]
    fn test_unknown_connections_sort_last() {
        let candidates = vec![
            candidate("unknown", 1.0, None, None),
            candidate("busy", 1.0, None, Some(500)),
        ];
        assert_eq!(LeastConnections::pick(&candidates).unwrap().id(), "busy");

        let unknown = vec![candidate("u1", 1.0, None, None), candidate("u2", 1.0, None, None)];
        assert_eq!(LeastConnections::pick(&unknown).unwrap().id(), "u1");
    }
}
