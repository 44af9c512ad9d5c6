//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends
//! - Update backend health state based on results
//! - Publish health and weights together as one snapshot

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::health::probe::{ProbeError, Prober};
use crate::health::state::{HealthState, Thresholds, Transition};
use crate::load_balancer::history::PerformanceHistory;
use crate::load_balancer::weights::{WeightEngine, WeightMap};
use crate::observability::metrics;
use crate::registry::ServerRegistry;

/// Health and weights as of one cycle.
///
/// Replaced wholesale, so readers never observe a partial update.
#[derive(Debug, Clone, Default)]
pub struct HealthTable {
    pub states: HashMap<String, HealthState>,
    pub weights: WeightMap,
    /// Incremented on every completed cycle.
    pub generation: u64,
}

impl HealthTable {
    pub fn is_healthy(&self, id: &str) -> bool {
        self.states.get(id).is_some_and(HealthState::is_healthy)
    }

    /// Weight of a backend; unknown backends weigh nothing.
    pub fn weight(&self, id: &str) -> f64 {
        self.weights.get(id).copied().unwrap_or(0.0)
    }
}

/// Monitor tuning.
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub thresholds: Thresholds,
    pub probe_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            probe_timeout: Duration::from_millis(5000),
        }
    }
}

impl From<&HealthCheckConfig> for MonitorSettings {
    fn from(config: &HealthCheckConfig) -> Self {
        Self {
            thresholds: Thresholds {
                failure: config.failure_threshold,
                success: config.success_threshold,
            },
            probe_timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

/// Summary of one probe cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub probed: usize,
    pub failures: usize,
    pub transitions: Vec<(String, Transition)>,
}

pub struct HealthMonitor {
    registry: Arc<ServerRegistry>,
    prober: Arc<dyn Prober>,
    history: Arc<PerformanceHistory>,
    engine: WeightEngine,
    settings: MonitorSettings,
    table: ArcSwap<HealthTable>,
    /// Keeps cycles from overlapping.
    cycle: Mutex<()>,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ServerRegistry>,
        prober: Arc<dyn Prober>,
        history: Arc<PerformanceHistory>,
        engine: WeightEngine,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            registry,
            prober,
            history,
            engine,
            settings,
            table: ArcSwap::from_pointee(HealthTable::default()),
            cycle: Mutex::new(()),
        }
    }

    /// Start tracking a newly registered backend as Healthy.
    pub fn track(&self, id: &str) {
        self.table.rcu(|current| {
            let mut next = HealthTable::clone(current);
            next.states.entry(id.to_string()).or_default();
            next.weights = self.engine.recompute(&next.states, &self.history);
            next
        });
    }

    /// Forget a deregistered backend.
    pub fn untrack(&self, id: &str) {
        self.table.rcu(|current| {
            let mut next = HealthTable::clone(current);
            next.states.remove(id);
            next.weights = self.engine.recompute(&next.states, &self.history);
            next
        });
    }

    /// Latest published snapshot.
    pub fn table(&self) -> Arc<HealthTable> {
        self.table.load_full()
    }

    pub fn is_healthy(&self, id: &str) -> bool {
        self.table.load().is_healthy(id)
    }

    pub fn state(&self, id: &str) -> Option<HealthState> {
        self.table.load().states.get(id).cloned()
    }

    pub fn settings(&self) -> MonitorSettings {
        self.settings
    }

    /// Probe every registered backend once and publish the results.
    pub async fn run_cycle(&self) -> CycleReport {
        let _cycle = self.cycle.lock().await;
        let snapshot = self.registry.snapshot();
        let timeout = self.settings.probe_timeout;

        let probes = snapshot.iter().map(|entry| {
            let descriptor = entry.descriptor.clone();
            async move {
                let started = Instant::now();
                let outcome = match time::timeout(timeout, self.prober.probe(&descriptor)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(ProbeError::Timeout(timeout.as_millis() as u64)),
                };
                metrics::record_probe(&descriptor.id, outcome.is_ok(), started);
                (descriptor, outcome)
            }
        });
        let outcomes = join_all(probes).await;

        let mut report = CycleReport {
            probed: outcomes.len(),
            ..Default::default()
        };
        for (descriptor, outcome) in &outcomes {
            if let Err(e) = outcome {
                report.failures += 1;
                tracing::warn!(backend_id = %descriptor.id, error = %e, "Health check failed");
            }
        }

        let thresholds = self.settings.thresholds;
        let mut transitions = Vec::new();
        let previous = self.table.rcu(|current| {
            transitions.clear();
            let mut next = HealthTable::clone(current);
            for (descriptor, outcome) in &outcomes {
                // Deregistered while the probe was in flight.
                let Some(state) = next.states.get_mut(&descriptor.id) else {
                    continue;
                };
                let transition = match outcome {
                    Ok(probe) => state.record_success(probe, thresholds),
                    Err(_) => state.record_failure(thresholds),
                };
                if let Some(transition) = transition {
                    transitions.push((descriptor.id.clone(), transition));
                }
            }
            next.weights = self.engine.recompute(&next.states, &self.history);
            next.generation += 1;
            next
        });

        for (id, transition) in &transitions {
            match transition {
                Transition::BecameHealthy => {
                    tracing::info!(backend_id = %id, "Backend transitioned to Healthy")
                }
                Transition::BecameUnhealthy => {
                    tracing::warn!(backend_id = %id, "Backend transitioned to Unhealthy")
                }
            }
        }

        let table = self.table.load();
        for (id, state) in &table.states {
            metrics::record_backend_health(id, state.is_healthy());
            metrics::record_backend_weight(id, table.weight(id));
        }
        tracing::debug!(
            generation = previous.generation + 1,
            probed = report.probed,
            failures = report.failures,
            "Health cycle complete"
        );

        report.transitions = transitions;
        report
    }

    /// Run cycles on a fixed interval until shutdown.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            timeout_ms = self.settings.probe_timeout.as_millis() as u64,
            failure_threshold = self.settings.thresholds.failure,
            success_threshold = self.settings.thresholds.success,
            "Health monitor starting"
        );

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
