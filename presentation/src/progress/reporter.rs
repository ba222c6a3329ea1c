//! Progress reporting for council jobs
//!
//! Both reporters consume the [`ProgressEvent`]s of a
//! [`JobWatcher`](council_application::JobWatcher).

use colored::Colorize;
use council_application::ProgressEvent;
use council_domain::{Stage, StageStreams, StreamStatus, WorkerId};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Something that shows job progress to the user
pub trait ProgressView: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

fn stage_short_name(stage: Stage) -> &'static str {
    match stage {
        Stage::Stage1 => "Stage 1",
        Stage::Stage2 => "Stage 2",
        Stage::Stage3 => "Stage 3",
    }
}

fn status_mark(status: StreamStatus) -> String {
    match status {
        StreamStatus::Complete => "v".green().to_string(),
        StreamStatus::Failed => "x".red().to_string(),
        StreamStatus::Skipped => "-".yellow().to_string(),
        _ => " ".to_string(),
    }
}

#[derive(Default)]
struct ReporterState {
    stage: Option<Stage>,
    stage_bar: Option<ProgressBar>,
    worker_bars: BTreeMap<WorkerId, ProgressBar>,
}

/// Reports progress with one bar per stage and a spinner per worker
pub struct ProgressReporter {
    multi: MultiProgress,
    state: Mutex<ReporterState>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    /// Reporter that tracks bars without drawing them
    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            state: Mutex::new(ReporterState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ReporterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stage_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn worker_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("  {spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn start_stage(&self, state: &mut ReporterState, stage: Stage) {
        if state.stage == Some(stage) {
            return;
        }
        Self::clear_workers(state);
        if let Some(pb) = state.stage_bar.take() {
            pb.finish_and_clear();
        }

        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(Self::stage_style());
        pb.set_prefix(stage.display_name());
        pb.set_message("Starting...");
        pb.enable_steady_tick(Duration::from_millis(120));

        state.stage = Some(stage);
        state.stage_bar = Some(pb);
    }

    fn update_streams(&self, state: &mut ReporterState, stage: Stage, streams: &StageStreams) {
        self.start_stage(state, stage);

        for (worker, stream) in streams {
            let pb = state.worker_bars.entry(worker.clone()).or_insert_with(|| {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::worker_style());
                pb.set_prefix(worker.to_string());
                pb.enable_steady_tick(Duration::from_millis(120));
                pb
            });
            if pb.is_finished() {
                continue;
            }
            let message = format!("{} {} chars", stream.status.as_str(), stream.char_count);
            if stream.status.is_terminal() {
                pb.finish_with_message(format!("{} {}", status_mark(stream.status), message));
            } else {
                pb.set_message(message);
            }
        }

        if let Some(pb) = &state.stage_bar {
            let done = streams.values().filter(|s| s.status.is_terminal()).count();
            pb.set_length(streams.len() as u64);
            pb.set_position(done as u64);
            pb.set_message(format!("{} streaming", streams.len() - done));
        }
    }

    fn complete_stage(&self, state: &mut ReporterState, stage: Stage, summary: String) {
        self.start_stage(state, stage);
        Self::clear_workers(state);
        if let Some(pb) = state.stage_bar.take() {
            pb.finish_with_message(format!("{} {}", stage_short_name(stage).green(), summary));
        }
        state.stage = None;
    }

    fn clear_workers(state: &mut ReporterState) {
        for (_, pb) in std::mem::take(&mut state.worker_bars) {
            pb.finish_and_clear();
        }
    }

    fn finish(&self, state: &mut ReporterState, message: String) {
        Self::clear_workers(state);
        if let Some(pb) = state.stage_bar.take() {
            pb.abandon_with_message(message);
        }
        state.stage = None;
    }

    #[cfg(test)]
    fn snapshot(&self) -> (Option<Stage>, Option<(u64, Option<u64>)>, usize) {
        let state = self.state();
        let bar = state.stage_bar.as_ref().map(|pb| (pb.position(), pb.length()));
        (state.stage, bar, state.worker_bars.len())
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressView for ProgressReporter {
    fn on_event(&self, event: &ProgressEvent) {
        let mut state = self.state();
        match event {
            ProgressEvent::JobStarted { .. } => {}
            ProgressEvent::StageStarted(stage) => self.start_stage(&mut state, *stage),
            ProgressEvent::StageProgress { stage, streams } => {
                self.update_streams(&mut state, *stage, streams)
            }
            ProgressEvent::Stage1Complete(results) => self.complete_stage(
                &mut state,
                Stage::Stage1,
                format!("complete! {} answers", results.len()),
            ),
            ProgressEvent::Stage2Complete { results, metadata } => {
                let summary = match &metadata.skipped_reason {
                    Some(reason) => format!("skipped ({})", reason),
                    None => format!("complete! {} rankings", results.len()),
                };
                self.complete_stage(&mut state, Stage::Stage2, summary)
            }
            ProgressEvent::Stage3Complete(result) => self.complete_stage(
                &mut state,
                Stage::Stage3,
                format!("complete! chairman {}", result.model),
            ),
            ProgressEvent::Complete(_) => self.finish(&mut state, "done".to_string()),
            ProgressEvent::Error { message, .. } => {
                self.finish(&mut state, format!("{} {}", "failed:".red(), message))
            }
        }
    }
}

/// Simple text-based progress (no fancy UI), for non-terminal output
#[derive(Default)]
pub struct SimpleProgress {
    reported: Mutex<HashSet<(Stage, WorkerId)>>,
}

impl SimpleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressView for SimpleProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StageStarted(stage) => {
                eprintln!("{} {}", "->".cyan(), stage.display_name().bold());
            }
            ProgressEvent::StageProgress { stage, streams } => {
                let mut reported = self.reported.lock().unwrap_or_else(PoisonError::into_inner);
                for (worker, stream) in streams {
                    if stream.status.is_terminal() && reported.insert((*stage, worker.clone())) {
                        eprintln!(
                            "  {} {} ({})",
                            status_mark(stream.status),
                            worker,
                            stream.status.as_str()
                        );
                    }
                }
            }
            ProgressEvent::Stage1Complete(_)
            | ProgressEvent::Stage2Complete { .. }
            | ProgressEvent::Stage3Complete(_) => eprintln!(),
            ProgressEvent::Error { message, .. } => eprintln!("{} {}", "x".red(), message),
            ProgressEvent::JobStarted { .. } | ProgressEvent::Complete(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_domain::{Stage1Result, WorkerStream};

    fn w(s: &str) -> WorkerId {
        s.parse().unwrap()
    }

    fn streams(entries: &[(&str, StreamStatus)]) -> StageStreams {
        entries
            .iter()
            .map(|(worker, status)| {
                let mut stream = WorkerStream::default();
                stream.push("hello");
                stream.set_status(*status);
                (w(worker), stream)
            })
            .collect()
    }

    #[test]
    fn test_stage_bar_tracks_finished_workers() {
        let reporter = ProgressReporter::hidden();
        reporter.on_event(&ProgressEvent::StageStarted(Stage::Stage1));
        reporter.on_event(&ProgressEvent::StageProgress {
            stage: Stage::Stage1,
            streams: streams(&[
                ("a", StreamStatus::Complete),
                ("b", StreamStatus::Streaming),
                ("c", StreamStatus::Failed),
            ]),
        });

        assert_eq!(reporter.snapshot(), (Some(Stage::Stage1), Some((2, Some(3))), 3));
    }

    #[test]
    fn test_stage_completion_clears_worker_bars() {
        let reporter = ProgressReporter::hidden();
        reporter.on_event(&ProgressEvent::StageProgress {
            stage: Stage::Stage1,
            streams: streams(&[("a", StreamStatus::Streaming)]),
        });
        reporter.on_event(&ProgressEvent::Stage1Complete(vec![Stage1Result::new(w("a"), "x")]));

        assert_eq!(reporter.snapshot(), (None, None, 0));
    }

    #[test]
    fn test_error_finishes_display() {
        let reporter = ProgressReporter::hidden();
        reporter.on_event(&ProgressEvent::StageStarted(Stage::Stage2));
        reporter.on_event(&ProgressEvent::Error {
            message: "Job cancelled by user".to_string(),
            job: None,
        });

        assert_eq!(reporter.snapshot(), (None, None, 0));
    }

    #[test]
    fn test_simple_progress_reports_each_worker_once() {
        let progress = SimpleProgress::new();
        let event = ProgressEvent::StageProgress {
            stage: Stage::Stage1,
            streams: streams(&[("a", StreamStatus::Complete), ("b", StreamStatus::Streaming)]),
        };
        progress.on_event(&event);
        progress.on_event(&event);

        let reported = progress.reported.lock().unwrap();
        assert_eq!(reported.len(), 1);
        assert!(reported.contains(&(Stage::Stage1, w("a"))));
    }
}
