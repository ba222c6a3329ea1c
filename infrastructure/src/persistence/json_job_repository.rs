//! One JSON file per job snapshot

use council_application::{JobRepository, PersistenceError};
use council_domain::{Job, JobId};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Job snapshots under `<dir>/<job id>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash never leaves a half-written snapshot behind.
pub struct JsonJobRepository {
    dir: PathBuf,
}

impl JsonJobRepository {
    /// Open (creating if needed) the snapshot directory
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &JobId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

impl JobRepository for JsonJobRepository {
    fn save(&self, job: &Job) -> Result<(), PersistenceError> {
        let path = self.path_for(&job.id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(job)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, id: &JobId) -> Result<(), PersistenceError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn load_all(&self) -> Result<Vec<Job>, PersistenceError> {
        let mut jobs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read(&path)
                .map_err(PersistenceError::from)
                .and_then(|bytes| serde_json::from_slice::<Job>(&bytes).map_err(Into::into));
            match parsed {
                Ok(job) => jobs.push(job),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable job snapshot"),
            }
        }
        debug!(count = jobs.len(), dir = %self.dir.display(), "Loaded job snapshots");
        Ok(jobs)
    }
}
