//! Line-based control commands read from stdin
//!
//! `skip <model>` stops waiting for one worker, `continue` force-finishes
//! stage 1 and `cancel` abandons the job.

use council_application::{JobService, WorkerGateway};
use council_domain::{JobId, WorkerId};
use std::io::{self, BufRead};
use std::thread;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A control signal typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Model id or display name as typed
    Skip(String),
    Continue,
    Cancel,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlParseError {
    #[error("skip needs a model, e.g. `skip openai/gpt-4o`")]
    MissingModel,

    #[error("unknown command `{0}` (try: skip <model>, continue, cancel)")]
    Unknown(String),
}

impl ControlCommand {
    /// Parse one input line. Blank lines give `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, ControlParseError> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        match command.to_ascii_lowercase().as_str() {
            "skip" => words
                .next()
                .map(|model| Some(ControlCommand::Skip(model.to_string())))
                .ok_or(ControlParseError::MissingModel),
            "continue" | "force" => Ok(Some(ControlCommand::Continue)),
            "cancel" | "quit" => Ok(Some(ControlCommand::Cancel)),
            other => Err(ControlParseError::Unknown(other.to_string())),
        }
    }
}

/// Read stdin line by line on a dedicated thread and forward parsed
/// commands until stdin closes or the receiver is dropped. Parse errors are
/// printed to stderr.
pub fn spawn_stdin_reader(tx: mpsc::Sender<ControlCommand>) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-control".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "Could not read stdin");
                        return;
                    }
                };
                match ControlCommand::parse(&line) {
                    Ok(Some(command)) => {
                        if tx.blocking_send(command).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => eprintln!("{}", e),
                }
            }
            debug!("stdin closed");
        })
}

/// Resolve a typed model against the council: exact id first, then a
/// case-insensitive display name
fn resolve_worker<'a>(council: &'a [WorkerId], typed: &str) -> Option<&'a WorkerId> {
    council
        .iter()
        .find(|w| w.as_str() == typed)
        .or_else(|| {
            council
                .iter()
                .find(|w| w.display_name().eq_ignore_ascii_case(typed))
        })
}

/// Apply a command to the running job. Returns a line for the user.
pub fn apply_command<G: WorkerGateway + 'static>(
    service: &JobService<G>,
    job_id: &JobId,
    command: &ControlCommand,
) -> String {
    match command {
        ControlCommand::Skip(typed) => {
            let Some(worker) = resolve_worker(&service.council().models, typed) else {
                return format!("No council model matches `{}`", typed);
            };
            match service.skip_worker(job_id, worker) {
                Ok(true) => format!("Skipped {}", worker),
                Ok(false) => format!("{} already finished or skipped", worker),
                Err(e) => format!("Could not skip {}: {}", worker, e),
            }
        }
        ControlCommand::Continue => match service.force_continue(job_id) {
            Ok(true) => "Continuing with the answers received so far".to_string(),
            Ok(false) => "Nothing to continue: waiting for a first answer or past stage 1"
                .to_string(),
            Err(e) => format!("Could not continue: {}", e),
        },
        ControlCommand::Cancel => {
            if service.cancel(job_id) {
                "Job cancelled".to_string()
            } else {
                "Job already finished".to_string()
            }
        }
    }
}
