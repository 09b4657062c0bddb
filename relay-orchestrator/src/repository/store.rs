//! Job persistence
//!
//! Optional external persistence for the registry. Each job is stored as one
//! flat JSON record keyed by its id.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use relay_core::domain::job::{JobId, JobRecord};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Stored record is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persistence hook for job records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts or replaces a record
    async fn save(&self, record: &JobRecord) -> Result<(), StoreError>;

    /// Removes a record; removing a missing record is not an error
    async fn remove(&self, id: JobId) -> Result<(), StoreError>;

    /// Loads every stored record
    async fn load_all(&self) -> Result<Vec<JobRecord>, StoreError>;
}

/// Stores each job as `<dir>/<job_id>.json`
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: JobId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl JobStore for JsonFileStore {
    async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        let path = self.path_for(record.id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(record)?;

        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, id: JobId) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn load_all(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<JobRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable job file {}: {}", path.display(), e),
            }
        }

        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }
}
