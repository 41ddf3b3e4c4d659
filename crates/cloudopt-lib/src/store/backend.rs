//! Durable storage backends for the audit store
//!
//! This module provides:
//! - In-memory backend (no persistence)
//! - Append-only JSON-lines journal, fsynced per commit and replayed on open

use crate::error::{CoreError, CoreResult};
use crate::models::{AuditEntry, Resource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// State recovered from a backend on startup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredState {
    pub resources: Vec<Resource>,
    pub entries: Vec<AuditEntry>,
}

/// Persistence contract used by the store
///
/// Calls are made while the store holds its commit lock, so implementations
/// see commits in audit id order. A returned error aborts the commit.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Load previously committed state, `None` if nothing was persisted
    fn load(&self) -> CoreResult<Option<StoredState>>;

    /// Persist one committed transition
    fn record_transition(&self, resource: &Resource, entry: &AuditEntry) -> CoreResult<()>;

    /// Persist a bulk reset
    fn record_reseed(&self, resources: &[Resource]) -> CoreResult<()>;
}

/// Backend that keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackend;

impl StorageBackend for MemoryBackend {
    fn load(&self) -> CoreResult<Option<StoredState>> {
        Ok(None)
    }

    fn record_transition(&self, _resource: &Resource, _entry: &AuditEntry) -> CoreResult<()> {
        Ok(())
    }

    fn record_reseed(&self, _resources: &[Resource]) -> CoreResult<()> {
        Ok(())
    }
}

/// One line of the journal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JournalRecord {
    Reseed { resources: Vec<Resource> },
    Transition { resource: Resource, entry: AuditEntry },
}

/// Append-only JSON-lines journal
///
/// The file only ever holds complete, newline-terminated records: a torn
/// tail found on load is cut off, and a failed append is truncated back to
/// the length it had before. If that truncation fails too, the handle is
/// dropped and every later write fails until the journal is reopened.
pub struct JournalBackend {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JournalBackend {
    /// Open (or create) the journal at `path`
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "Opened audit journal");

        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, Option<File>>> {
        self.file
            .lock()
            .map_err(|_| CoreError::StorageUnavailable("journal lock poisoned".to_string()))
    }

    fn append(&self, record: &JournalRecord) -> CoreResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut guard = self.lock()?;
        let file = guard.as_mut().ok_or_else(|| {
            CoreError::StorageUnavailable(format!(
                "journal {} closed after a failed write, reopen to recover",
                self.path.display()
            ))
        })?;

        let committed_len = file.metadata()?.len();
        let err = match file.write_all(&line).and_then(|_| file.sync_all()) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        let rollback = file.set_len(committed_len).and_then(|_| file.sync_all());
        match rollback {
            Ok(()) => {
                warn!(path = %self.path.display(), error = %err, "Journal append failed, partial write removed");
            }
            Err(rollback) => {
                error!(
                    path = %self.path.display(),
                    error = %err,
                    rollback_error = %rollback,
                    "Journal append failed and could not be rolled back, closing journal"
                );
                *guard = None;
            }
        }

        Err(err.into())
    }
}

impl fmt::Debug for JournalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JournalBackend")
            .field("path", &self.path)
            .finish()
    }
}

impl StorageBackend for JournalBackend {
    fn load(&self) -> CoreResult<Option<StoredState>> {
        let mut guard = self.lock()?;

        let mut data = Vec::new();
        File::open(&self.path)?.read_to_end(&mut data)?;

        let mut state: Option<StoredState> = None;
        let mut offset = 0usize;
        let mut lines = data.split_inclusive(|b| *b == b'\n').enumerate().peekable();

        while let Some((n, line)) = lines.next() {
            let start = offset;
            offset += line.len();
            let is_last = lines.peek().is_none();

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let record: JournalRecord = match serde_json::from_slice(line) {
                Ok(record) => record,
                // A torn final line means the process died mid-append; that commit never succeeded
                Err(e) if is_last => {
                    warn!(path = %self.path.display(), line = n + 1, error = %e, "Truncating torn journal tail");
                    if let Some(file) = guard.as_mut() {
                        file.set_len(start as u64)?;
                        file.sync_all()?;
                    }
                    break;
                }
                Err(e) => return Err(e.into()),
            };

            // Complete record that lost its newline; terminate it before appending more
            if is_last && !line.ends_with(b"\n") {
                if let Some(file) = guard.as_mut() {
                    file.write_all(b"\n")?;
                    file.sync_all()?;
                }
            }

            match record {
                JournalRecord::Reseed { resources } => {
                    state = Some(StoredState {
                        resources,
                        entries: Vec::new(),
                    });
                }
                JournalRecord::Transition { resource, entry } => {
                    let state = state.get_or_insert_with(StoredState::default);
                    match state.resources.iter_mut().find(|r| r.id == resource.id) {
                        Some(existing) => *existing = resource,
                        None => state.resources.push(resource),
                    }
                    state.entries.push(entry);
                }
            }
        }

        if let Some(ref s) = state {
            debug!(
                resources = s.resources.len(),
                entries = s.entries.len(),
                "Replayed audit journal"
            );
        }

        Ok(state)
    }

    fn record_transition(&self, resource: &Resource, entry: &AuditEntry) -> CoreResult<()> {
        self.append(&JournalRecord::Transition {
            resource: resource.clone(),
            entry: entry.clone(),
        })
    }

    fn record_reseed(&self, resources: &[Resource]) -> CoreResult<()> {
        self.append(&JournalRecord::Reseed {
            resources: resources.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceStatus;
    use chrono::Utc;
    use tempfile::TempDir;

    fn resource(id: i64, utilization: f64, status: ResourceStatus) -> Resource {
        Resource {
            id,
            name: format!("server-{}", id),
            utilization,
            status,
            cost: 10.0,
        }
    }

    fn entry(id: u64, resource_id: i64) -> AuditEntry {
        AuditEntry {
            id,
            resource_id,
            action: "make_idle".to_string(),
            old_utilization: 40.0,
            old_status: ResourceStatus::Running,
            new_utilization: 0.0,
            new_status: ResourceStatus::Idle,
            timestamp: Utc::now(),
            actor: "tester".to_string(),
        }
    }

    #[test]
    fn test_empty_journal_loads_nothing() {
        let dir = TempDir::new().unwrap();
        let journal = JournalBackend::open(dir.path().join("audit.jsonl")).unwrap();
        assert!(journal.load().unwrap().is_none());
    }

    #[test]
    fn test_replay_applies_transitions_after_last_reseed() {
        let dir = TempDir::new().unwrap();
        let journal = JournalBackend::open(dir.path().join("audit.jsonl")).unwrap();

        journal
            .record_reseed(&[resource(1, 40.0, ResourceStatus::Running)])
            .unwrap();
        journal
            .record_transition(&resource(1, 0.0, ResourceStatus::Idle), &entry(1, 1))
            .unwrap();
        journal
            .record_reseed(&[
                resource(1, 3.0, ResourceStatus::Running),
                resource(2, 0.0, ResourceStatus::Idle),
            ])
            .unwrap();
        journal
            .record_transition(&resource(2, 0.0, ResourceStatus::Idle), &entry(1, 2))
            .unwrap();

        let state = journal.load().unwrap().unwrap();
        assert_eq!(state.resources.len(), 2);
        assert_eq!(state.resources[0].utilization, 3.0);
        assert_eq!(state.entries.len(), 1);
        assert_eq!(state.entries[0].resource_id, 2);
    }

    #[test]
    fn test_torn_tail_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let journal = JournalBackend::open(&path).unwrap();
        journal
            .record_reseed(&[resource(1, 40.0, ResourceStatus::Running)])
            .unwrap();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"kind\":\"transition\",\"resou").unwrap();

        let state = journal.load().unwrap().unwrap();
        assert_eq!(state.resources.len(), 1);
        assert!(state.entries.is_empty());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("]}\n"), "torn fragment must be cut off");
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_appends_after_torn_tail_replay_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        {
            let journal = JournalBackend::open(&path).unwrap();
            journal
                .record_reseed(&[resource(1, 40.0, ResourceStatus::Running)])
                .unwrap();
        }
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"kind\":\"transition\",\"resou").unwrap();

        let journal = JournalBackend::open(&path).unwrap();
        journal.load().unwrap();
        journal
            .record_transition(&resource(1, 0.0, ResourceStatus::Idle), &entry(1, 1))
            .unwrap();
        journal
            .record_transition(&resource(1, 55.0, ResourceStatus::Running), &entry(2, 1))
            .unwrap();

        let state = JournalBackend::open(&path).unwrap().load().unwrap().unwrap();
        assert_eq!(state.entries.len(), 2);
        assert_eq!(state.resources[0].utilization, 55.0);
    }

    #[test]
    fn test_unterminated_last_record_is_kept_and_terminated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let record = serde_json::to_string(&JournalRecord::Reseed {
            resources: vec![resource(1, 40.0, ResourceStatus::Running)],
        })
        .unwrap();
        std::fs::write(&path, &record).unwrap();

        let journal = JournalBackend::open(&path).unwrap();
        assert_eq!(journal.load().unwrap().unwrap().resources.len(), 1);
        journal
            .record_transition(&resource(1, 0.0, ResourceStatus::Idle), &entry(1, 1))
            .unwrap();

        let state = journal.load().unwrap().unwrap();
        assert_eq!(state.entries.len(), 1);
    }

    #[test]
    fn test_corrupt_middle_line_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        std::fs::write(&path, "not json\n{\"kind\":\"reseed\",\"resources\":[]}\n").unwrap();

        let journal = JournalBackend::open(&path).unwrap();
        assert!(matches!(
            journal.load(),
            Err(CoreError::StorageUnavailable(_))
        ));
    }
}
