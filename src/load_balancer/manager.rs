//! Balancer facade.
//!
//! # Responsibilities
//! - Keep registry, health monitor and latency history in step on roster changes
//! - Build the healthy candidate list from one health snapshot
//! - Run the health and stats loops

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{BackendConfig, BalancerConfig, HealthCheckConfig, StrategyConfig};
use crate::health::{CycleReport, HealthMonitor, HealthState, HttpProber, MonitorSettings, Prober};
use crate::load_balancer::history::PerformanceHistory;
use crate::load_balancer::scheduler::{
    Algorithm, Candidate, NoAvailableBackend, Scheduler, SelectionContext,
};
use crate::load_balancer::weights::WeightEngine;
use crate::load_balancer::BalancerError;
use crate::registry::{BackendDescriptor, RuntimeStats, ServerRegistry, StatsProvider};

/// Admin view of one backend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendView {
    #[serde(flatten)]
    pub descriptor: BackendDescriptor,
    pub health: Option<HealthState>,
    pub weight: f64,
    pub stats: Option<RuntimeStats>,
    pub recent_latency_ms: Option<f64>,
    pub samples: usize,
}

pub struct LoadBalancer {
    registry: Arc<ServerRegistry>,
    monitor: Arc<HealthMonitor>,
    history: Arc<PerformanceHistory>,
    scheduler: Scheduler,
    sample_window: usize,
}

impl LoadBalancer {
    pub fn new(
        strategy: &StrategyConfig,
        health: &HealthCheckConfig,
        prober: Arc<dyn Prober>,
    ) -> Result<Self, BalancerError> {
        let algorithm = Algorithm::from_str(&strategy.algorithm)?;
        let registry = Arc::new(ServerRegistry::new());
        let history = Arc::new(PerformanceHistory::new(strategy.max_performance_history));
        let engine = WeightEngine::new(strategy.performance_history_sample_window);
        let monitor = Arc::new(HealthMonitor::new(
            registry.clone(),
            prober,
            history.clone(),
            engine,
            MonitorSettings::from(health),
        ));

        Ok(Self {
            registry,
            monitor,
            history,
            scheduler: Scheduler::new(algorithm),
            sample_window: engine.sample_window(),
        })
    }

    /// Build from configuration with the HTTP prober and the configured roster.
    pub fn from_config(config: &BalancerConfig) -> Result<Self, BalancerError> {
        let prober = Arc::new(HttpProber::new(config.health_check.path.clone()));
        let balancer = Self::new(&config.balancer, &config.health_check, prober)?;
        for backend in &config.backends {
            balancer.register(BackendDescriptor::from_config(backend)?)?;
        }
        Ok(balancer)
    }

    /// Replace the scheduler, keeping the active algorithm.
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        scheduler.set(self.scheduler.algorithm());
        self.scheduler = scheduler;
        self
    }

    /// Register a backend; it starts Healthy with an empty history.
    pub fn register(&self, descriptor: BackendDescriptor) -> Result<Arc<BackendDescriptor>, BalancerError> {
        let descriptor = self.registry.register(descriptor)?;
        self.history.track(&descriptor.id);
        self.monitor.track(&descriptor.id);
        Ok(descriptor)
    }

    pub fn update(&self, descriptor: BackendDescriptor) -> Result<Arc<BackendDescriptor>, BalancerError> {
        Ok(self.registry.update(descriptor)?)
    }

    pub fn deregister(&self, id: &str) -> Result<Arc<BackendDescriptor>, BalancerError> {
        let descriptor = self.registry.deregister(id)?;
        self.monitor.untrack(id);
        self.history.untrack(id);
        Ok(descriptor)
    }

    /// Bring the roster in line with a configuration's backend list.
    pub fn reconcile(&self, backends: &[BackendConfig]) -> Result<(), BalancerError> {
        let desired = backends
            .iter()
            .map(BackendDescriptor::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        for entry in self.registry.snapshot().iter() {
            if !desired.iter().any(|d| d.id == entry.descriptor.id) {
                self.deregister(&entry.descriptor.id)?;
            }
        }

        for descriptor in desired {
            match self.registry.get(&descriptor.id) {
                None => {
                    self.register(descriptor)?;
                }
                Some(entry) if *entry.descriptor != descriptor => {
                    self.update(descriptor)?;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    pub fn algorithm(&self) -> Algorithm {
        self.scheduler.algorithm()
    }

    pub fn set_algorithm(&self, name: &str) -> Result<Algorithm, BalancerError> {
        self.scheduler.set_algorithm(name)
    }

    /// Healthy backends in registration order, with weights from the same snapshot.
    pub fn healthy_candidates(&self) -> Vec<Candidate> {
        let table = self.monitor.table();
        self.registry
            .snapshot()
            .iter()
            .filter(|entry| table.is_healthy(&entry.descriptor.id))
            .map(|entry| {
                let id = entry.descriptor.id.as_str();
                let state = table.states.get(id);
                let stats = entry.stats.as_ref();
                Candidate {
                    descriptor: entry.descriptor.clone(),
                    weight: table.weight(id),
                    load: state.and_then(|s| s.load).or(stats.map(|s| s.cpu_load)),
                    active_connections: state
                        .and_then(|s| s.active_connections)
                        .or(stats.map(|s| s.active_connections)),
                    specialization: state
                        .and_then(|s| s.specialization.clone())
                        .or_else(|| entry.descriptor.specialization.clone()),
                }
            })
            .collect()
    }

    pub fn select<'a>(
        &self,
        algorithm: Algorithm,
        candidates: &'a [Candidate],
        ctx: &SelectionContext<'_>,
    ) -> Result<&'a Candidate, NoAvailableBackend> {
        self.scheduler.select(algorithm, candidates, ctx)
    }

    pub fn record_latency(&self, id: &str, elapsed: Duration) {
        self.history.record(id, elapsed);
    }

    pub async fn run_health_cycle(&self) -> CycleReport {
        self.monitor.run_cycle().await
    }

    pub fn spawn_health_checks(
        &self,
        interval: Duration,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.monitor.clone().run(interval, shutdown))
    }

    pub fn spawn_stats_refresh(
        &self,
        provider: Arc<dyn StatsProvider>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let registry = self.registry.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        registry.refresh(provider.as_ref()).await;
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Stats refresh received shutdown signal, exiting loop");
                        break;
                    }
                }
            }
        })
    }

    pub fn backends(&self) -> Vec<BackendView> {
        let table = self.monitor.table();
        self.registry
            .snapshot()
            .iter()
            .map(|entry| {
                let id = entry.descriptor.id.as_str();
                BackendView {
                    descriptor: BackendDescriptor::clone(&entry.descriptor),
                    health: table.states.get(id).cloned(),
                    weight: table.weight(id),
                    stats: entry.stats.clone(),
                    recent_latency_ms: self.history.recent_mean(id, self.sample_window),
                    samples: self.history.len(id),
                }
            })
            .collect()
    }

    pub fn backend(&self, id: &str) -> Option<BackendView> {
        self.backends().into_iter().find(|view| view.descriptor.id == id)
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn history(&self) -> &Arc<PerformanceHistory> {
        &self.history
    }
}
