//! Job Registry
//!
//! Owns every job record of the process. All mutations go through
//! [`JobRegistry::update`], which compares the record's current status with the
//! status the caller expects before applying the change. A retry that raced the
//! polling loop (or a webhook) therefore fails with `StatusConflict` instead of
//! overwriting a newer state.
//!
//! Every committed change carries a revision taken under the registry lock.
//! Writes to the store are serialized per job and a revision older than the
//! one already stored is dropped, so the store never regresses to a stale
//! record.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use relay_core::domain::job::{JobId, JobRecord, JobStatus, NewJob};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::store::JobStore;

/// Registry error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    #[error("Job {0} not found")]
    NotFound(JobId),

    #[error("Idempotency key already used by in-flight job {existing}")]
    DuplicateSubmission { existing: JobId },

    #[error("Job {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: JobId,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("Job {0} is still in flight")]
    InFlight(JobId),

    #[error("Update of job {id} rejected: {reason}")]
    InvariantViolation { id: JobId, reason: String },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Filter for listing jobs
#[derive(Debug, Clone, Copy, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
}

#[derive(Default)]
struct RegistryState {
    jobs: HashMap<JobId, JobRecord>,
    idempotency: HashMap<String, JobId>,
    revision: u64,
}

impl RegistryState {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

/// In-memory job registry with an optional write-through store
pub struct JobRegistry {
    state: RwLock<RegistryState>,
    store: Option<Arc<dyn JobStore>>,
    /// Last revision written to the store, per job
    stored: Mutex<HashMap<JobId, Arc<Mutex<u64>>>>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl JobRegistry {
    pub fn new(store: Option<Arc<dyn JobStore>>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            store,
            stored: Mutex::new(HashMap::new()),
        }
    }

    /// Create a new `PENDING` job
    ///
    /// Fails with `DuplicateSubmission` when the idempotency key belongs to a
    /// job that has not reached a terminal status yet. A key whose job is
    /// terminal (or gone) is rebound to the new job.
    pub async fn create(&self, job: NewJob) -> Result<JobRecord> {
        let record = JobRecord::new(job);

        let revision = {
            let mut state = self.state.write().await;

            if let Some(key) = &record.idempotency_key {
                if let Some(existing) = state.idempotency.get(key).copied() {
                    let live = state
                        .jobs
                        .get(&existing)
                        .is_some_and(|job| !job.status.is_terminal());
                    if live {
                        return Err(RegistryError::DuplicateSubmission { existing });
                    }
                }
                state.idempotency.insert(key.clone(), record.id);
            }

            state.jobs.insert(record.id, record.clone());
            state.next_revision()
        };

        debug!("Registered job {}", record.id);
        self.persist(&record, revision).await;

        Ok(record)
    }

    /// Get a job by ID
    pub async fn get(&self, id: JobId) -> Result<JobRecord> {
        self.state
            .read()
            .await
            .jobs
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound(id))
    }

    /// The in-flight job holding `key`, if any
    pub async fn live_job_for_key(&self, key: &str) -> Option<JobId> {
        let state = self.state.read().await;
        state
            .idempotency
            .get(key)
            .copied()
            .filter(|id| state.jobs.get(id).is_some_and(|job| !job.status.is_terminal()))
    }

    /// List jobs, oldest first
    pub async fn list(&self, filter: JobFilter) -> Vec<JobRecord> {
        let state = self.state.read().await;
        let mut jobs: Vec<JobRecord> = state
            .jobs
            .values()
            .filter(|job| filter.status.is_none_or(|status| job.status == status))
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }

    /// Apply a mutation to a job whose status is still `expected`
    ///
    /// The mutation runs under the registry lock; `updated_at` is refreshed
    /// afterwards. A mutation that leaves the record violating its invariants
    /// is discarded.
    pub async fn update<F>(&self, id: JobId, expected: JobStatus, mutate: F) -> Result<JobRecord>
    where
        F: FnOnce(&mut JobRecord),
    {
        let (updated, revision) = {
            let mut state = self.state.write().await;
            let revision = state.revision + 1;
            let current = state.jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;

            if current.status != expected {
                return Err(RegistryError::StatusConflict {
                    id,
                    expected,
                    actual: current.status,
                });
            }

            let mut next = current.clone();
            mutate(&mut next);
            next.id = id;
            next.updated_at = Utc::now();

            next.check_invariants()
                .map_err(|reason| RegistryError::InvariantViolation { id, reason })?;

            *current = next.clone();
            state.revision = revision;
            (next, revision)
        };

        self.persist(&updated, revision).await;
        Ok(updated)
    }

    /// Remove a terminal job
    ///
    /// Jobs that are still being orchestrated cannot be evicted.
    pub async fn evict(&self, id: JobId) -> Result<JobRecord> {
        let removed = {
            let mut state = self.state.write().await;
            let status = state
                .jobs
                .get(&id)
                .map(|job| job.status)
                .ok_or(RegistryError::NotFound(id))?;

            if !status.is_terminal() {
                return Err(RegistryError::InFlight(id));
            }

            let removed = state.jobs.remove(&id).ok_or(RegistryError::NotFound(id))?;
            if let Some(key) = &removed.idempotency_key {
                if state.idempotency.get(key) == Some(&id) {
                    state.idempotency.remove(key);
                }
            }
            removed
        };

        self.forget(id).await;
        Ok(removed)
    }

    /// Evict every terminal job last updated longer than `retention` ago
    pub async fn evict_expired(&self, retention: Duration) -> Vec<JobId> {
        let retention = chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(retention)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let expired: Vec<JobId> = {
            let state = self.state.read().await;
            state
                .jobs
                .values()
                .filter(|job| job.status.is_terminal() && job.updated_at < cutoff)
                .map(|job| job.id)
                .collect()
        };

        let mut evicted = Vec::with_capacity(expired.len());
        for id in expired {
            match self.evict(id).await {
                Ok(_) => evicted.push(id),
                Err(e) => debug!("Skipping eviction of job {}: {}", id, e),
            }
        }
        evicted
    }

    /// Seed the registry with records loaded from the store
    pub async fn restore(&self, records: Vec<JobRecord>) -> usize {
        let mut state = self.state.write().await;
        let mut restored = 0;

        for record in records {
            if let Err(reason) = record.check_invariants() {
                warn!("Ignoring stored job {}: {}", record.id, reason);
                continue;
            }
            if let Some(key) = &record.idempotency_key {
                let newer = state
                    .idempotency
                    .get(key)
                    .and_then(|id| state.jobs.get(id))
                    .is_some_and(|other| other.created_at > record.created_at);
                if !newer {
                    state.idempotency.insert(key.clone(), record.id);
                }
            }
            state.jobs.insert(record.id, record);
            restored += 1;
        }

        restored
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn stored_slot(&self, id: JobId) -> Arc<Mutex<u64>> {
        self.stored.lock().await.entry(id).or_default().clone()
    }

    /// Write `record` unless the store already holds a newer revision of it
    async fn persist(&self, record: &JobRecord, revision: u64) {
        let Some(store) = &self.store else {
            return;
        };

        let slot = self.stored_slot(record.id).await;
        let mut stored = slot.lock().await;
        if *stored >= revision {
            debug!("Skipping stale write of job {} (revision {})", record.id, revision);
            return;
        }
        // Evicted while this write was queued
        if !self.state.read().await.jobs.contains_key(&record.id) {
            return;
        }

        match store.save(record).await {
            Ok(()) => *stored = revision,
            Err(e) => warn!("Failed to persist job {}: {}", record.id, e),
        }
    }

    async fn forget(&self, id: JobId) {
        let Some(store) = &self.store else {
            return;
        };

        let slot = self.stored_slot(id).await;
        let _stored = slot.lock().await;
        if let Err(e) = store.remove(id).await {
            warn!("Failed to remove stored job {}: {}", id, e);
        }
        self.stored.lock().await.remove(&id);
    }
}
