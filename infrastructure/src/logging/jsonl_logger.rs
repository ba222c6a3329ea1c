//! JSONL file writer for job events.
//!
//! Each [`JobEvent`] is serialized as a single JSON line with a `type` field
//! and `timestamp`, appended to the file via a buffered writer.

use council_application::{ControlAction, JobEvent, JobEventLogger};
use serde_json::{Value, json};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// JSONL job event logger that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlJobEventLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlJobEventLogger {
    /// Open the log at `path` for appending.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create job log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open job log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn payload(event: &JobEvent) -> Value {
    match event {
        JobEvent::JobCreated {
            job_id,
            conversation_id,
        } => json!({
            "job_id": job_id.as_str(),
            "conversation_id": conversation_id.as_str(),
        }),
        JobEvent::StatusChanged {
            job_id,
            from,
            to,
            error,
        } => json!({
            "job_id": job_id.as_str(),
            "from": from.as_str(),
            "to": to.as_str(),
            "error": error,
        }),
        JobEvent::WorkerStatus {
            job_id,
            stage,
            worker,
            status,
        } => json!({
            "job_id": job_id.as_str(),
            "stage": stage.as_str(),
            "worker": worker.as_str(),
            "status": status.as_str(),
        }),
        JobEvent::Control { job_id, action } => {
            let (name, worker) = match action {
                ControlAction::Skip(worker) => ("skip", Some(worker.as_str())),
                ControlAction::ForceContinue => ("force_continue", None),
                ControlAction::Cancel => ("cancel", None),
            };
            json!({
                "job_id": job_id.as_str(),
                "action": name,
                "worker": worker,
            })
        }
    }
}

impl JobEventLogger for JsonlJobEventLogger {
    fn log(&self, event: &JobEvent) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let mut record = payload(event);
        if let Value::Object(map) = &mut record {
            map.insert("type".to_string(), Value::String(event.event_type().to_string()));
            map.insert("timestamp".to_string(), Value::String(timestamp));
        }

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            // JSONL is append-only; flush each line for crash safety
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlJobEventLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::StoreListener;
    use council_domain::{ConversationId, JobId, JobStatus, Stage, StreamStatus};
    use std::io::Read;

    fn read_lines(path: &Path) -> Vec<Value> {
        let mut content = String::new();
        File::open(path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        content
            .trim()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_jsonl_logger_writes_valid_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("jobs.jsonl");
        let logger = JsonlJobEventLogger::new(&path).unwrap();
        let job_id = JobId::from("job-1");

        logger.log(&JobEvent::JobCreated {
            job_id: job_id.clone(),
            conversation_id: ConversationId::new("c1"),
        });
        logger.log(&JobEvent::StatusChanged {
            job_id: job_id.clone(),
            from: JobStatus::Pending,
            to: JobStatus::Stage1Running,
            error: None,
        });
        logger.log(&JobEvent::WorkerStatus {
            job_id: job_id.clone(),
            stage: Stage::Stage1,
            worker: "openai/gpt-4o".parse().unwrap(),
            status: StreamStatus::Complete,
        });
        logger.log(&JobEvent::Control {
            job_id,
            action: ControlAction::Skip("x/y".parse().unwrap()),
        });
        drop(logger);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 4);
        for line in &lines {
            assert_eq!(line["job_id"], "job-1");
            assert!(line.get("timestamp").is_some());
        }
        assert_eq!(lines[0]["type"], "job_created");
        assert_eq!(lines[0]["conversation_id"], "c1");
        assert_eq!(lines[1]["type"], "status_changed");
        assert_eq!(lines[1]["to"], JobStatus::Stage1Running.as_str());
        assert_eq!(lines[2]["type"], "worker_status");
        assert_eq!(lines[2]["worker"], "openai/gpt-4o");
        assert_eq!(lines[3]["type"], "control");
        assert_eq!(lines[3]["action"], "skip");
        assert_eq!(lines[3]["worker"], "x/y");
    }

    #[test]
    fn test_appends_across_instances_and_acts_as_listener() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.jsonl");
        let event = JobEvent::Control {
            job_id: JobId::from("j"),
            action: ControlAction::Cancel,
        };

        JsonlJobEventLogger::new(&path).unwrap().log(&event);
        let listener: Box<dyn StoreListener> = Box::new(JsonlJobEventLogger::new(&path).unwrap());
        listener.on_event(&event);
        drop(listener);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["action"], "cancel");
        assert!(lines[1]["worker"].is_null());
    }
}
