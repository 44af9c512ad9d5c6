//! Predictor-assisted selection.
//!
//! Order of precedence:
//! 1. A candidate specialized for the request's classification with load under 80
//! 2. On an anomaly signal, the candidate with the lowest load
//! 3. The candidate at the highest predictor score
//! 4. Least connections, when there is no prediction or the score index is out of range

use crate::load_balancer::least_conn::LeastConnections;
use crate::load_balancer::scheduler::{Candidate, SelectionContext, SelectionStrategy};

/// Load at or above which a specialized backend is not preferred.
pub const SPECIALIZATION_LOAD_LIMIT: f64 = 80.0;

#[derive(Debug, Default)]
pub struct PredictorAssisted;

impl PredictorAssisted {
    pub fn new() -> Self {
        Self
    }
}

fn specialized_for<'a>(candidates: &'a [Candidate], classification: &str) -> Option<&'a Candidate> {
    candidates.iter().find(|c| {
        c.specialization
            .as_deref()
            .is_some_and(|tag| tag.eq_ignore_ascii_case(classification))
            && c.load.is_some_and(|load| load < SPECIALIZATION_LOAD_LIMIT)
    })
}

/// Lowest load; unknown load sorts last, ties go to the earliest registered.
fn least_loaded(candidates: &[Candidate]) -> Option<&Candidate> {
    candidates
        .iter()
        .min_by(|a, b| {
            let a = a.load.unwrap_or(f64::INFINITY);
            let b = b.load.unwrap_or(f64::INFINITY);
            a.total_cmp(&b)
        })
}

/// Index of the first maximum, ignoring NaN scores.
fn argmax(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, score) in scores.iter().copied().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

impl SelectionStrategy for PredictorAssisted {
    fn select<'a>(
        &self,
        candidates: &'a [Candidate],
        ctx: &SelectionContext<'_>,
    ) -> Option<&'a Candidate> {
        if candidates.is_empty() {
            return None;
        }

        if let Some(candidate) = specialized_for(candidates, &ctx.content.classification) {
            return Some(candidate);
        }

        let Some(prediction) = ctx.prediction else {
            return LeastConnections::pick(candidates);
        };

        if prediction.is_anomaly {
            return least_loaded(candidates);
        }

        match argmax(&prediction.server_selection) {
            Some(index) if index < candidates.len() => Some(&candidates[index]),
            _ => {
                tracing::debug!(
                    scores = prediction.server_selection.len(),
                    candidates = candidates.len(),
                    "Predictor score index out of range, using least connections"
                );
                LeastConnections::pick(candidates)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::scheduler::testing::{candidate, content};
    use crate::routing::PredictorOutput;

    fn prediction(scores: Vec<f64>, is_anomaly: bool) -> PredictorOutput {
        PredictorOutput {
            server_selection: scores,
            is_anomaly,
            ..PredictorOutput::default()
        }
    }

    fn specialized(id: &str, tag: &str, load: f64) -> Candidate {
        let mut c = candidate(id, 1.0, Some(load), Some(0));
        c.specialization = Some(tag.to_string());
        c
    }

    #[test]
    fn test_specialization_short_circuits_scores() {
        let candidates = vec![
            candidate("a", 1.0, Some(5.0), Some(0)),
            specialized("b", "API", 40.0),
        ];
        let info = content("api");
        let output = prediction(vec![1.0, 0.0], true);
        let ctx = SelectionContext {
            content: &info,
            prediction: Some(&output),
        };
        assert_eq!(PredictorAssisted::new().select(&candidates, &ctx).unwrap().id(), "b");
    }

    #[test]
    fn test_overloaded_specialist_is_skipped() {
        let candidates = vec![
            candidate("a", 1.0, Some(5.0), Some(0)),
            specialized("b", "api", 80.0),
        ];
        let info = content("api");
        let output = prediction(vec![0.9, 0.1], false);
        let ctx = SelectionContext {
            content: &info,
            prediction: Some(&output),
        };
        assert_eq!(PredictorAssisted::new().select(&candidates, &ctx).unwrap().id(), "a");
    }

    #[test]
    fn test_anomaly_picks_lowest_load_ignoring_scores() {
        let candidates = vec![
            candidate("a", 1.0, Some(70.0), Some(0)),
            candidate("b", 1.0, Some(15.0), Some(9)),
            candidate("c", 1.0, None, Some(0)),
        ];
        let info = content("unknown");
        let output = prediction(vec![0.0, 0.0, 1.0], true);
        let ctx = SelectionContext {
            content: &info,
            prediction: Some(&output),
        };
        assert_eq!(PredictorAssisted::new().select(&candidates, &ctx).unwrap().id(), "b");
    }

    #[test]
    fn test_max_score_index() {
        let candidates = vec![
            candidate("a", 1.0, Some(10.0), Some(0)),
            candidate("b", 1.0, Some(10.0), Some(0)),
            candidate("c", 1.0, Some(10.0), Some(0)),
        ];
        let info = content("unknown");
        let output = prediction(vec![0.2, 0.7, 0.7], false);
        let ctx = SelectionContext {
            content: &info,
            prediction: Some(&output),
        };
        assert_eq!(PredictorAssisted::new().select(&candidates, &ctx).unwrap().id(), "b");
    }

    #[test]
    fn test_out_of_range_score_falls_back_to_least_connections() {
        let candidates = vec![
            candidate("a", 1.0, Some(10.0), Some(3)),
            candidate("b", 1.0, Some(10.0), Some(1)),
        ];
        let info = content("unknown");
        let output = prediction(vec![0.1, 0.2, 0.9], false);
        let ctx = SelectionContext {
            content: &info,
            prediction: Some(&output),
        };
        assert_eq!(PredictorAssisted::new().select(&candidates, &ctx).unwrap().id(), "b");

        let no_prediction = SelectionContext {
            content: &info,
            prediction: None,
        };
        assert_eq!(
            PredictorAssisted::new().select(&candidates, &no_prediction).unwrap().id(),
            "b"
        );
    }

    #[test]
    fn test_argmax_ignores_nan() {
        assert_eq!(argmax(&[f64::NAN, 0.5, 0.2]), Some(1));
        assert_eq!(argmax(&[f64::NAN]), None);
        assert_eq!(argmax(&[]), None);
    }
}
