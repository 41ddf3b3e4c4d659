//! State and audit store
//!
//! Holds current resource state and the append-only audit trail. Every state
//! change goes through [`AuditStore::apply_transition`], which captures the
//! old state, runs the mutator, persists through the [`StorageBackend`] and
//! appends the audit entry as one unit.
//!
//! Locking:
//! - each resource row has its own mutex, so transitions on one resource
//!   serialize while different resources proceed concurrently
//! - the audit log mutex is the commit point; id and timestamp allocation,
//!   the backend write and both in-memory updates happen while holding it
//!   together with the row lock
//! - lock order is row map, then row, then audit log

mod backend;
mod random;


pub use backend::{JournalBackend, MemoryBackend, StorageBackend, StoredState};
pub use random::{
    BusyRange, FixedUtilization, SeededUtilization, UtilizationSource, DEFAULT_BUSY_MAX,
    DEFAULT_BUSY_MIN,
};

use crate::error::{CoreError, CoreResult};
use crate::models::{
    AuditEntry, NewResource, Resource, ResourceId, ResourceStatus, StatePatch, DEFAULT_ACTOR,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Action label of the idle transition
pub const ACTION_MAKE_IDLE: &str = "make_idle";

/// Action label of the busy transition
pub const ACTION_MAKE_BUSY: &str = "make_busy";

/// Default number of audit entries returned by listing
pub const DEFAULT_AUDIT_LIMIT: usize = 50;

/// Ordering of audit listings on `(timestamp, id)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuditOrder {
    /// Newest first
    #[default]
    Descending,
    /// Oldest first
    Ascending,
}

/// One resource row; `epoch` ties it to the reseed that installed it
#[derive(Debug)]
struct Row {
    resource: Resource,
    epoch: u64,
}

#[derive(Debug, Default)]
struct AuditLog {
    entries: Vec<AuditEntry>,
    next_id: u64,
    last_timestamp: Option<DateTime<Utc>>,
    epoch: u64,
}

impl AuditLog {
    fn restore(entries: Vec<AuditEntry>) -> Self {
        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let last_timestamp = entries.iter().map(|e| e.timestamp).max();
        Self {
            entries,
            next_id,
            last_timestamp,
            epoch: 0,
        }
    }

    /// Commit-time timestamp, never earlier than the previous entry
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }
}

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Utilization range drawn by `make_busy`
    pub busy_range: BusyRange,
    /// Actor recorded when none is given
    pub default_actor: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_range: BusyRange::default(),
            default_actor: DEFAULT_ACTOR.to_string(),
        }
    }
}

/// Builder for [`AuditStore`]
pub struct AuditStoreBuilder {
    backend: Arc<dyn StorageBackend>,
    utilization: Arc<dyn UtilizationSource>,
    config: StoreConfig,
}

impl Default for AuditStoreBuilder {
    fn default() -> Self {
        Self {
            backend: Arc::new(MemoryBackend),
            utilization: Arc::new(SeededUtilization::from_entropy()),
            config: StoreConfig::default(),
        }
    }
}

impl AuditStoreBuilder {
    pub fn backend(mut self, backend: impl StorageBackend + 'static) -> Self {
        self.backend = Arc::new(backend);
        self
    }

    pub fn utilization_source(mut self, source: impl UtilizationSource + 'static) -> Self {
        self.utilization = Arc::new(source);
        self
    }

    pub fn busy_range(mut self, range: BusyRange) -> Self {
        self.config.busy_range = range;
        self
    }

    pub fn default_actor(mut self, actor: impl Into<String>) -> Self {
        self.config.default_actor = actor.into();
        self
    }

    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the store, restoring whatever the backend persisted
    pub fn build(self) -> CoreResult<AuditStore> {
        let state = self.backend.load()?.unwrap_or_default();

        info!(
            resources = state.resources.len(),
            audit_entries = state.entries.len(),
            "Audit store initialized"
        );

        let rows = state
            .resources
            .into_iter()
            .map(|r| (r.id, Arc::new(Mutex::new(Row { resource: r, epoch: 0 }))))
            .collect();

        Ok(AuditStore {
            rows: RwLock::new(rows),
            log: Mutex::new(AuditLog::restore(state.entries)),
            backend: self.backend,
            utilization: self.utilization,
            config: self.config,
        })
    }
}

/// Transactional resource state with an append-only audit trail
pub struct AuditStore {
    rows: RwLock<BTreeMap<ResourceId, Arc<Mutex<Row>>>>,
    log: Mutex<AuditLog>,
    backend: Arc<dyn StorageBackend>,
    utilization: Arc<dyn UtilizationSource>,
    config: StoreConfig,
}

impl AuditStore {
    pub fn builder() -> AuditStoreBuilder {
        AuditStoreBuilder::default()
    }

    /// Store without persistence
    pub fn in_memory() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            log: Mutex::new(AuditLog::restore(Vec::new())),
            backend: Arc::new(MemoryBackend),
            utilization: Arc::new(SeededUtilization::from_entropy()),
            config: StoreConfig::default(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Apply a named transition to one resource and record it
    ///
    /// `mutator` receives the current state and returns the new
    /// utilization/status pair. On success the updated resource and its
    /// audit entry are returned; on failure nothing changes.
    pub async fn apply_transition<F>(
        &self,
        resource_id: ResourceId,
        action: &str,
        mutator: F,
        actor: Option<&str>,
    ) -> CoreResult<(Resource, AuditEntry)>
    where
        F: FnOnce(&Resource) -> StatePatch,
    {
        let row = self
            .rows
            .read()
            .await
            .get(&resource_id)
            .cloned()
            .ok_or(CoreError::NotFound(resource_id))?;

        let mut row = row.lock().await;
        let old = row.resource.clone();
        let patch = mutator(&old);

        if !patch.utilization.is_finite() || patch.utilization < 0.0 {
            return Err(CoreError::InvalidRecord {
                index: 0,
                reason: format!(
                    "{} on resource {} produced utilization {}",
                    action, resource_id, patch.utilization
                ),
            });
        }

        let mut log = self.log.lock().await;

        // The row was replaced by a reseed while we waited for it
        if row.epoch != log.epoch {
            return Err(CoreError::Conflict(resource_id));
        }

        let updated = Resource {
            utilization: patch.utilization,
            status: patch.status,
            ..old.clone()
        };

        let entry = AuditEntry {
            id: log.next_id,
            resource_id,
            action: action.to_string(),
            old_utilization: old.utilization,
            old_status: old.status,
            new_utilization: updated.utilization,
            new_status: updated.status,
            timestamp: log.next_timestamp(),
            actor: self.resolve_actor(actor),
        };

        self.backend.record_transition(&updated, &entry)?;

        log.next_id += 1;
        log.entries.push(entry.clone());
        row.resource = updated.clone();

        debug!(
            resource_id = resource_id,
            action = %entry.action,
            audit_id = entry.id,
            old_status = %entry.old_status,
            new_status = %entry.new_status,
            actor = %entry.actor,
            "Transition committed"
        );

        Ok((updated, entry))
    }

    /// Set utilization to 0 and status to idle
    pub async fn make_idle(
        &self,
        resource_id: ResourceId,
        actor: Option<&str>,
    ) -> CoreResult<(Resource, AuditEntry)> {
        self.apply_transition(
            resource_id,
            ACTION_MAKE_IDLE,
            |_| StatePatch {
                utilization: 0.0,
                status: ResourceStatus::Idle,
            },
            actor,
        )
        .await
    }

    /// Draw a busy utilization and set status to running
    pub async fn make_busy(
        &self,
        resource_id: ResourceId,
        actor: Option<&str>,
    ) -> CoreResult<(Resource, AuditEntry)> {
        let source = Arc::clone(&self.utilization);
        let range = self.config.busy_range;

        self.apply_transition(
            resource_id,
            ACTION_MAKE_BUSY,
            move |_| StatePatch {
                utilization: source.next_utilization(range),
                status: ResourceStatus::Running,
            },
            actor,
        )
        .await
    }

    /// Current state of one resource
    pub async fn get_resource(&self, resource_id: ResourceId) -> CoreResult<Resource> {
        let row = self
            .rows
            .read()
            .await
            .get(&resource_id)
            .cloned()
            .ok_or(CoreError::NotFound(resource_id))?;

        let row = row.lock().await;
        Ok(row.resource.clone())
    }

    /// All resources ordered by id
    pub async fn list_resources(&self) -> Vec<Resource> {
        let rows: Vec<_> = self.rows.read().await.values().cloned().collect();

        let mut resources = Vec::with_capacity(rows.len());
        for row in rows {
            resources.push(row.lock().await.resource.clone());
        }
        resources
    }

    /// Up to `limit` audit entries in the requested order
    pub async fn list_audit(&self, limit: usize, order: AuditOrder) -> Vec<AuditEntry> {
        let log = self.log.lock().await;
        select_entries(log.entries.iter(), limit, order)
    }

    /// Newest-first audit entries for one resource
    pub async fn audit_for_resource(&self, resource_id: ResourceId, limit: usize) -> Vec<AuditEntry> {
        let log = self.log.lock().await;
        select_entries(
            log.entries.iter().filter(|e| e.resource_id == resource_id),
            limit,
            AuditOrder::Descending,
        )
    }

    /// Number of committed audit entries
    pub async fn audit_len(&self) -> usize {
        self.log.lock().await.entries.len()
    }

    /// Clear all resources and audit entries and install a fresh set
    ///
    /// Ids restart at 1. Transitions that were waiting on a replaced row fail
    /// with `Conflict`.
    pub async fn reseed(&self, initial: Vec<NewResource>) -> CoreResult<Vec<Resource>> {
        for (index, r) in initial.iter().enumerate() {
            if !r.utilization.is_finite() || r.utilization < 0.0 || !r.cost.is_finite() || r.cost < 0.0 {
                return Err(CoreError::InvalidRecord {
                    index,
                    reason: format!("resource {:?} has negative or non-finite metrics", r.name),
                });
            }
        }

        let resources: Vec<Resource> = initial
            .into_iter()
            .zip(1..)
            .map(|(r, id)| Resource {
                id,
                name: r.name,
                utilization: r.utilization,
                status: r.status,
                cost: r.cost,
            })
            .collect();

        let mut rows = self.rows.write().await;
        let mut log = self.log.lock().await;

        self.backend.record_reseed(&resources)?;

        let epoch = log.epoch + 1;
        *log = AuditLog {
            epoch,
            ..AuditLog::restore(Vec::new())
        };
        *rows = resources
            .iter()
            .cloned()
            .map(|r| (r.id, Arc::new(Mutex::new(Row { resource: r, epoch }))))
            .collect();

        info!(resources = resources.len(), epoch = epoch, "Store reseeded");
        Ok(resources)
    }

    fn resolve_actor(&self, actor: Option<&str>) -> String {
        match actor.map(str::trim) {
            Some(a) if !a.is_empty() => a.to_string(),
            _ => self.config.default_actor.clone(),
        }
    }
}

fn select_entries<'a>(
    entries: impl DoubleEndedIterator<Item = &'a AuditEntry>,
    limit: usize,
    order: AuditOrder,
) -> Vec<AuditEntry> {
    // Entries are appended in (timestamp, id) order already
    match order {
        AuditOrder::Ascending => entries.take(limit).cloned().collect(),
        AuditOrder::Descending => entries.rev().take(limit).cloned().collect(),
    }
}
