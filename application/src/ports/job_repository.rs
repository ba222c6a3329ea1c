//! Job repository port
//!
//! Durable key-value storage for job snapshots. Calls happen while the job
//! store holds its lock, so implementations are synchronous.

use council_domain::{Job, JobId};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait JobRepository: Send + Sync {
    /// Write (or overwrite) one job snapshot
    fn save(&self, job: &Job) -> Result<(), PersistenceError>;

    /// Delete a snapshot; missing ids are not an error
    fn remove(&self, id: &JobId) -> Result<(), PersistenceError>;

    /// Every stored snapshot
    fn load_all(&self) -> Result<Vec<Job>, PersistenceError>;
}

/// Repository that forgets everything, for tests and `--no-persist` runs
pub struct NoPersistence;

impl JobRepository for NoPersistence {
    fn save(&self, _job: &Job) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn remove(&self, _id: &JobId) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Job>, PersistenceError> {
        Ok(Vec::new())
    }
}

/// In-process repository; survives store restarts within one process
#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self, id: &JobId) -> Option<Job> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

impl JobRepository for InMemoryJobRepository {
    fn save(&self, job: &Job) -> Result<(), PersistenceError> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job.id.clone(), job.clone());
        Ok(())
    }

    fn remove(&self, id: &JobId) -> Result<(), PersistenceError> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Job>, PersistenceError> {
        Ok(self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }
}
