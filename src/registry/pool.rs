//! Backend roster management.
//!
//! # Responsibilities
//! - Hold backend descriptors in registration order, ids unique
//! - Hold each backend's latest runtime stats
//! - Publish the roster as a lock-free snapshot for request routing

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use futures_util::future::join_all;

use crate::registry::{BackendDescriptor, RegistryError, RuntimeStats, StatsProvider};

/// One registered backend and its latest stats.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub descriptor: Arc<BackendDescriptor>,
    /// `None` until the first successful refresh.
    pub stats: Option<RuntimeStats>,
}

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub updated: usize,
    pub stale: usize,
}

/// Registered backends and their runtime stats.
#[derive(Debug)]
pub struct ServerRegistry {
    entries: ArcSwap<Vec<RegistryEntry>>,
    /// Serializes writers; readers go through `entries` only.
    writer: Mutex<()>,
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a backend at the end of the roster.
    pub fn register(
        &self,
        descriptor: BackendDescriptor,
    ) -> Result<Arc<BackendDescriptor>, RegistryError> {
        let _guard = self.lock();
        let current = self.entries.load_full();
        if current.iter().any(|e| e.descriptor.id == descriptor.id) {
            return Err(RegistryError::DuplicateBackend(descriptor.id));
        }

        let descriptor = Arc::new(descriptor);
        let mut next = Vec::clone(&current);
        next.push(RegistryEntry {
            descriptor: descriptor.clone(),
            stats: None,
        });
        self.entries.store(Arc::new(next));

        tracing::info!(backend_id = %descriptor.id, address = %descriptor.base_url, "Backend registered");
        Ok(descriptor)
    }

    /// Replace a backend's descriptor, keeping its position and stats.
    pub fn update(
        &self,
        descriptor: BackendDescriptor,
    ) -> Result<Arc<BackendDescriptor>, RegistryError> {
        let _guard = self.lock();
        let mut next = Vec::clone(&self.entries.load_full());
        let entry = next
            .iter_mut()
            .find(|e| e.descriptor.id == descriptor.id)
            .ok_or_else(|| RegistryError::UnknownBackend(descriptor.id.clone()))?;

        let descriptor = Arc::new(descriptor);
        entry.descriptor = descriptor.clone();
        self.entries.store(Arc::new(next));

        tracing::info!(backend_id = %descriptor.id, address = %descriptor.base_url, "Backend updated");
        Ok(descriptor)
    }

    /// Remove a backend from the roster.
    pub fn deregister(&self, id: &str) -> Result<Arc<BackendDescriptor>, RegistryError> {
        let _guard = self.lock();
        let mut next = Vec::clone(&self.entries.load_full());
        let index = next
            .iter()
            .position(|e| e.descriptor.id == id)
            .ok_or_else(|| RegistryError::UnknownBackend(id.to_string()))?;

        let removed = next.remove(index);
        self.entries.store(Arc::new(next));

        tracing::info!(backend_id = %id, "Backend deregistered");
        Ok(removed.descriptor)
    }

    /// Current roster in registration order.
    pub fn snapshot(&self) -> Arc<Vec<RegistryEntry>> {
        self.entries.load_full()
    }

    pub fn get(&self, id: &str) -> Option<RegistryEntry> {
        self.entries
            .load()
            .iter()
            .find(|e| e.descriptor.id == id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.load().iter().any(|e| e.descriptor.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }

    /// Fetch fresh stats for every backend concurrently.
    ///
    /// A failed fetch never blocks the others; the backend keeps its
    /// previous stats flagged as stale.
    pub async fn refresh(&self, provider: &dyn StatsProvider) -> RefreshSummary {
        let snapshot = self.snapshot();
        let fetches = snapshot.iter().map(|entry| {
            let descriptor = entry.descriptor.clone();
            async move {
                let result = provider.fetch(&descriptor).await;
                (descriptor, result)
            }
        });
        let results = join_all(fetches).await;

        let _guard = self.lock();
        let mut next = Vec::clone(&self.entries.load_full());
        let mut summary = RefreshSummary::default();

        for (descriptor, result) in results {
            // Skip backends deregistered while the fetch was in flight.
            let Some(entry) = next.iter_mut().find(|e| e.descriptor.id == descriptor.id) else {
                continue;
            };
            match result {
                Ok(stats) => {
                    entry.stats = Some(stats);
                    summary.updated += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        backend_id = %descriptor.id,
                        error = %e,
                        "Failed to refresh runtime stats, keeping stale value"
                    );
                    if let Some(stats) = entry.stats.as_mut() {
                        stats.stale = true;
                    }
                    summary.stale += 1;
                }
            }
        }

        self.entries.store(Arc::new(next));
        tracing::debug!(updated = summary.updated, stale = summary.stale, "Runtime stats refreshed");
        summary
    }
}
