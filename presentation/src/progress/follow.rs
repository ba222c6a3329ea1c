//! Foreground loop of a running job

use crate::control::{ControlCommand, apply_command};
use crate::progress::reporter::ProgressView;
use colored::Colorize;
use council_application::{JobService, ProgressEvent, WorkerGateway};
use council_domain::JobId;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Follow `job_id` until it ends, showing progress on `view` and applying
/// control commands as they arrive. Ctrl-C cancels the job.
///
/// Returns the terminal event, or `None` if the watcher ended without one.
pub async fn follow_job<G: WorkerGateway + 'static>(
    service: &JobService<G>,
    job_id: &JobId,
    view: Option<&dyn ProgressView>,
    mut controls: mpsc::Receiver<ControlCommand>,
) -> Option<ProgressEvent> {
    let events = service.watch(job_id).into_stream();
    futures::pin_mut!(events);
    let mut controls_open = true;
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.next() => {
                let event = event?;
                if let Some(view) = view {
                    view.on_event(&event);
                }
                if event.is_terminal() {
                    debug!(job_id = %job_id.short(), "Job reached a terminal event");
                    return Some(event);
                }
            }
            command = controls.recv(), if controls_open => match command {
                Some(command) => {
                    let reply = apply_command(service, job_id, &command);
                    eprintln!("{} {}", ">".cyan(), reply);
                }
                None => controls_open = false,
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                if signal.is_ok() {
                    info!(job_id = %job_id.short(), "Interrupted, cancelling job");
                    service.cancel(job_id);
                }
            }
        }
    }
}
