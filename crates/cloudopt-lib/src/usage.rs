//! Usage ledger
//!
//! Append-only store of billing/usage observations imported from cloud
//! providers. Records have their own id space and are fed to the
//! recommendation engine as an alternate input. Optionally persisted as a
//! JSON snapshot written atomically through a temp file.

use crate::error::{CoreError, CoreResult};
use crate::models::{NewUsageRecord, UsageRecord};
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct LedgerInner {
    records: Vec<UsageRecord>,
    next_id: u64,
}

/// Append-only usage ledger
#[derive(Debug)]
pub struct UsageLedger {
    inner: RwLock<LedgerInner>,
    persistence_path: Option<PathBuf>,
}

impl Default for UsageLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageLedger {
    /// Ledger without persistence
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(LedgerInner {
                records: Vec::new(),
                next_id: 1,
            }),
            persistence_path: None,
        }
    }

    /// Ledger persisted at `path`, loading any existing snapshot
    pub fn with_persistence(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();

        let records: Vec<UsageRecord> = if path.exists() {
            let data = std::fs::read(&path)?;
            serde_json::from_slice(&data)?
        } else {
            Vec::new()
        };

        let next_id = records.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        info!(path = %path.display(), records = records.len(), "Loaded usage ledger");

        Ok(Self {
            inner: RwLock::new(LedgerInner { records, next_id }),
            persistence_path: Some(path),
        })
    }

    /// Append a record, assigning its id and timestamp
    pub async fn add(&self, usage: NewUsageRecord) -> CoreResult<UsageRecord> {
        validate(&usage)?;

        let mut inner = self.inner.write().await;
        let record = UsageRecord {
            id: inner.next_id,
            cloud_provider: usage.cloud_provider,
            service_name: usage.service_name,
            resource_id: usage.resource_id,
            usage_amount: usage.usage_amount,
            cost: usage.cost,
            timestamp: Utc::now(),
        };

        if let Some(ref path) = self.persistence_path {
            let mut snapshot = inner.records.clone();
            snapshot.push(record.clone());
            save_to_disk(path, &snapshot)?;
        }

        inner.next_id += 1;
        inner.records.push(record.clone());

        debug!(
            usage_id = record.id,
            provider = %record.cloud_provider,
            service = %record.service_name,
            resource = %record.resource_id,
            "Usage record added"
        );

        Ok(record)
    }

    /// All records in insertion order
    pub async fn list(&self) -> Vec<UsageRecord> {
        self.inner.read().await.records.clone()
    }

    /// Owned snapshot for the recommendation engine
    pub async fn snapshot(&self) -> Vec<UsageRecord> {
        self.list().await
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

fn validate(usage: &NewUsageRecord) -> CoreResult<()> {
    let invalid = |reason: String| CoreError::InvalidRecord { index: 0, reason };

    for (field, value) in [
        ("cloud_provider", &usage.cloud_provider),
        ("service_name", &usage.service_name),
        ("resource_id", &usage.resource_id),
    ] {
        if value.trim().is_empty() {
            return Err(invalid(format!("{} must not be empty", field)));
        }
    }

    for (field, value) in [("usage_amount", usage.usage_amount), ("cost", usage.cost)] {
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(format!("{} must be a non-negative number, got {}", field, value)));
        }
    }

    Ok(())
}

fn save_to_disk(path: &Path, records: &[UsageRecord]) -> CoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec(records)?;

    // Write atomically using temp file
    let temp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)?;
    file.write_all(&json)?;
    file.sync_all()?;

    std::fs::rename(&temp_path, path)?;
    Ok(())
}
