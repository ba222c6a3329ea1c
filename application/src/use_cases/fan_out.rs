//! Concurrent fan-out executor
//!
//! Sends one task to N workers at once, one tokio task per worker, and
//! collects their replies. Individual workers can be skipped while they
//! run; the whole fan-out can be told to stop waiting (force-finish), after
//! which stragglers get a short grace period before being dropped.

use crate::ports::worker_gateway::{WorkerFailure, WorkerGateway};
use council_domain::{Message, StreamEvent, StreamStatus, WorkerId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How one worker's unit ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    Completed(String),
    Failed(WorkerFailure),
    /// Cancelled because the worker was skipped
    Skipped,
    /// Cancelled by force-finish
    Cancelled,
}

impl WorkerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkerOutcome::Completed(_))
    }

    /// Stream status recorded for this outcome
    pub fn stream_status(&self) -> StreamStatus {
        match self {
            WorkerOutcome::Completed(_) => StreamStatus::Complete,
            WorkerOutcome::Skipped => StreamStatus::Skipped,
            WorkerOutcome::Failed(_) | WorkerOutcome::Cancelled => StreamStatus::Failed,
        }
    }
}

/// Callbacks from a running fan-out
///
/// Called from worker tasks concurrently; implementations must be cheap
/// and must not block.
pub trait FanOutObserver: Send + Sync {
    /// A non-empty fragment, in arrival order per worker
    fn on_chunk(&self, _worker: &WorkerId, _chunk: &str) {}

    /// Exactly once per launched worker
    fn on_worker_done(&self, _worker: &WorkerId, _outcome: &WorkerOutcome) {}

    fn should_skip(&self, _worker: &WorkerId) -> bool {
        false
    }

    fn should_force_finish(&self) -> bool {
        false
    }
}

/// Result of one fan-out
#[derive(Debug, Clone, Default)]
pub struct FanOutReport {
    /// Completed replies, in the order the workers were given
    pub results: Vec<(WorkerId, String)>,
    /// Workers that produced no reply, in the order the workers were given
    pub failed: Vec<WorkerId>,
    /// Whether force-finish cut the fan-out short
    pub forced: bool,
}

pub struct FanOutExecutor<G: WorkerGateway + 'static> {
    gateway: Arc<G>,
    poll_interval: Duration,
    cancel_grace: Duration,
}

impl<G: WorkerGateway + 'static> FanOutExecutor<G> {
    pub fn new(gateway: Arc<G>, poll_interval: Duration, cancel_grace: Duration) -> Self {
        Self {
            gateway,
            poll_interval,
            cancel_grace,
        }
    }

    /// Run `messages` against every worker and wait until each unit is
    /// terminal, or until force-finish fired and the grace period elapsed.
    pub async fn run(
        &self,
        workers: &[WorkerId],
        messages: Vec<Message>,
        observer: Arc<dyn FanOutObserver>,
    ) -> FanOutReport {
        let messages = Arc::new(messages);
        let all = CancellationToken::new();
        let mut tokens: HashMap<WorkerId, CancellationToken> = HashMap::new();
        let mut join_set = JoinSet::new();

        for worker in workers {
            let token = all.child_token();
            tokens.insert(worker.clone(), token.clone());

            let gateway = Arc::clone(&self.gateway);
            let observer = Arc::clone(&observer);
            let messages = Arc::clone(&messages);
            let worker = worker.clone();

            join_set.spawn(async move {
                let outcome =
                    run_unit(gateway.as_ref(), &worker, &messages, observer.as_ref(), &token).await;
                (worker, outcome)
            });
        }

        let mut outcomes: HashMap<WorkerId, WorkerOutcome> = HashMap::new();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut forced = false;

        loop {
            tokio::select! {
                biased;
                joined = join_set.join_next() => match joined {
                    None => break,
                    Some(Ok((worker, outcome))) => {
                        settle(&mut outcomes, observer.as_ref(), worker, outcome);
                    }
                    Some(Err(e)) => warn!(error = %e, "Fan-out task failed"),
                },
                _ = ticker.tick() => {
                    for (worker, token) in &tokens {
                        if !outcomes.contains_key(worker) && observer.should_skip(worker) {
                            token.cancel();
                        }
                    }
                    if observer.should_force_finish() {
                        info!(
                            completed = outcomes.values().filter(|o| o.is_success()).count(),
                            "Force-finish requested, cancelling remaining workers"
                        );
                        forced = true;
                        all.cancel();
                        break;
                    }
                }
            }
        }

        if forced {
            let grace = tokio::time::sleep(self.cancel_grace);
            tokio::pin!(grace);
            loop {
                tokio::select! {
                    biased;
                    joined = join_set.join_next() => match joined {
                        None => break,
                        Some(Ok((worker, outcome))) => {
                            settle(&mut outcomes, observer.as_ref(), worker, outcome);
                        }
                        Some(Err(e)) => warn!(error = %e, "Fan-out task failed"),
                    },
                    _ = &mut grace => break,
                }
            }
            join_set.abort_all();
        }

        // Units that never reported (aborted, panicked) still get one outcome
        for worker in workers {
            if !outcomes.contains_key(worker) {
                settle(&mut outcomes, observer.as_ref(), worker.clone(), WorkerOutcome::Cancelled);
            }
        }

        let mut report = FanOutReport {
            forced,
            ..Default::default()
        };
        for worker in workers {
            match outcomes.remove(worker) {
                Some(WorkerOutcome::Completed(text)) => report.results.push((worker.clone(), text)),
                _ => report.failed.push(worker.clone()),
            }
        }
        report
    }
}

/// Record a unit's outcome and notify the observer.
///
/// A reply that raced a skip request is discarded.
fn settle(
    outcomes: &mut HashMap<WorkerId, WorkerOutcome>,
    observer: &dyn FanOutObserver,
    worker: WorkerId,
    mut outcome: WorkerOutcome,
) {
    if outcomes.contains_key(&worker) {
        return;
    }
    if outcome.is_success() && observer.should_skip(&worker) {
        outcome = WorkerOutcome::Skipped;
    }
    match &outcome {
        WorkerOutcome::Completed(text) => debug!(worker = %worker, chars = text.len(), "Worker complete"),
        WorkerOutcome::Failed(e) => warn!(worker = %worker, error = %e, "Worker failed"),
        WorkerOutcome::Skipped => info!(worker = %worker, "Worker skipped"),
        WorkerOutcome::Cancelled => debug!(worker = %worker, "Worker cancelled"),
    }
    observer.on_worker_done(&worker, &outcome);
    outcomes.insert(worker, outcome);
}

async fn run_unit<G: WorkerGateway + ?Sized>(
    gateway: &G,
    worker: &WorkerId,
    messages: &[Message],
    observer: &dyn FanOutObserver,
    token: &CancellationToken,
) -> WorkerOutcome {
    if observer.should_skip(worker) {
        return WorkerOutcome::Skipped;
    }

    let mut handle = tokio::select! {
        biased;
        _ = token.cancelled() => return cancelled(observer, worker),
        opened = gateway.stream(worker, messages) => match opened {
            Ok(handle) => handle,
            Err(e) => return WorkerOutcome::Failed(e),
        },
    };

    let mut text = String::new();
    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => return cancelled(observer, worker),
            event = handle.next() => event,
        };
        match event {
            Some(StreamEvent::Delta(chunk)) => {
                if chunk.is_empty() {
                    continue;
                }
                if observer.should_skip(worker) {
                    return WorkerOutcome::Skipped;
                }
                observer.on_chunk(worker, &chunk);
                text.push_str(&chunk);
            }
            Some(StreamEvent::Completed(full)) => {
                if text.is_empty() && !full.is_empty() {
                    if observer.should_skip(worker) {
                        return WorkerOutcome::Skipped;
                    }
                    observer.on_chunk(worker, &full);
                    text = full;
                }
                break;
            }
            Some(StreamEvent::Error(e)) => {
                return WorkerOutcome::Failed(WorkerFailure::unreachable(worker.clone(), e));
            }
            None => break,
        }
    }
    WorkerOutcome::Completed(text)
}

fn cancelled(observer: &dyn FanOutObserver, worker: &WorkerId) -> WorkerOutcome {
    if observer.should_skip(worker) {
        WorkerOutcome::Skipped
    } else {
        WorkerOutcome::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::worker_gateway::FailureReason;
    use crate::test_support::{Script, ScriptedGateway, w};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Recorder {
        chunks: Mutex<Vec<(WorkerId, String)>>,
        done: Mutex<Vec<(WorkerId, WorkerOutcome)>>,
        skipped: Mutex<HashSet<WorkerId>>,
        skip_on_chunk: Mutex<Option<(WorkerId, String)>>,
        force: AtomicBool,
    }

    impl Recorder {
        fn done_for(&self, worker: &WorkerId) -> Vec<WorkerOutcome> {
            self.done
                .lock()
                .unwrap()
                .iter()
                .filter(|(w, _)| w == worker)
                .map(|(_, o)| o.clone())
                .collect()
        }
    }

    impl FanOutObserver for Recorder {
        fn on_chunk(&self, worker: &WorkerId, chunk: &str) {
            self.chunks.lock().unwrap().push((worker.clone(), chunk.to_string()));
            let trigger = self.skip_on_chunk.lock().unwrap().clone();
            if trigger.is_some_and(|(w, c)| &w == worker && c == chunk) {
                self.skipped.lock().unwrap().insert(worker.clone());
            }
        }

        fn on_worker_done(&self, worker: &WorkerId, outcome: &WorkerOutcome) {
            self.done.lock().unwrap().push((worker.clone(), outcome.clone()));
        }

        fn should_skip(&self, worker: &WorkerId) -> bool {
            self.skipped.lock().unwrap().contains(worker)
        }

        fn should_force_finish(&self) -> bool {
            self.force.load(Ordering::SeqCst)
        }
    }

    fn executor(gateway: ScriptedGateway) -> FanOutExecutor<ScriptedGateway> {
        FanOutExecutor::new(
            Arc::new(gateway),
            Duration::from_millis(10),
            Duration::from_millis(20),
        )
    }

    #[tokio::test]
    async fn test_results_in_worker_order() {
        let exec = executor(ScriptedGateway::new(|worker, _| match worker.as_str() {
            "slow" => Script::chunks(&["s1", "s2"], Duration::from_millis(30)),
            "broken" => Script::Fail(FailureReason::Rejected),
            _ => Script::chunks(&["f"], Duration::ZERO),
        }));
        let recorder = Arc::new(Recorder::default());

        let report = exec
            .run(
                &[w("slow"), w("broken"), w("fast")],
                vec![Message::user("q")],
                recorder.clone(),
            )
            .await;

        assert_eq!(
            report.results,
            vec![(w("slow"), "s1s2".to_string()), (w("fast"), "f".to_string())]
        );
        assert_eq!(report.failed, vec![w("broken")]);
        assert!(!report.forced);

        for worker in [w("slow"), w("broken"), w("fast")] {
            assert_eq!(recorder.done_for(&worker).len(), 1);
        }
        let slow_chunks: Vec<_> = recorder
            .chunks
            .lock()
            .unwrap()
            .iter()
            .filter(|(w, _)| w.as_str() == "slow")
            .map(|(_, c)| c.clone())
            .collect();
        assert_eq!(slow_chunks, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_skip_cancels_one_worker() {
        let exec = executor(ScriptedGateway::new(|worker, _| match worker.as_str() {
            "hang" => Script::Hang,
            _ => Script::chunks(&["a", "b"], Duration::from_millis(20)),
        }));
        let recorder = Arc::new(Recorder::default());

        let skipper = recorder.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            skipper.skipped.lock().unwrap().insert(w("hang"));
        });

        let report = exec
            .run(&[w("hang"), w("ok")], vec![Message::user("q")], recorder.clone())
            .await;

        assert_eq!(report.results, vec![(w("ok"), "ab".to_string())]);
        assert_eq!(report.failed, vec![w("hang")]);
        assert_eq!(recorder.done_for(&w("hang")), vec![WorkerOutcome::Skipped]);
    }

    #[tokio::test]
    async fn test_skip_after_last_chunk_discards_reply() {
        // No poll tick lands before the unit returns, so the skip is only
        // seen when the completed reply is settled.
        let exec = FanOutExecutor::new(
            Arc::new(ScriptedGateway::new(|_, _| {
                Script::chunks(&["a", "b"], Duration::ZERO)
            })),
            Duration::from_secs(60),
            Duration::from_millis(20),
        );
        let recorder = Arc::new(Recorder::default());
        *recorder.skip_on_chunk.lock().unwrap() = Some((w("late"), "b".to_string()));

        let report = exec
            .run(&[w("late"), w("ok")], vec![Message::user("q")], recorder.clone())
            .await;

        assert_eq!(report.results, vec![(w("ok"), "ab".to_string())]);
        assert_eq!(report.failed, vec![w("late")]);
        assert_eq!(recorder.done_for(&w("late")), vec![WorkerOutcome::Skipped]);
        assert_eq!(recorder.done_for(&w("ok")).len(), 1);
    }

    #[tokio::test]
    async fn test_skipped_before_start_never_calls() {
        let gateway = ScriptedGateway::new(|_, _| Script::text("x"));
        let exec = executor(gateway);
        let recorder = Arc::new(Recorder::default());
        recorder.skipped.lock().unwrap().insert(w("a"));

        let report = exec
            .run(&[w("a"), w("b")], vec![Message::user("q")], recorder.clone())
            .await;

        assert_eq!(report.results, vec![(w("b"), "x".to_string())]);
        assert_eq!(exec.gateway.call_count(), 1);
        assert_eq!(recorder.done_for(&w("a")), vec![WorkerOutcome::Skipped]);
    }

    #[tokio::test]
    async fn test_force_finish_returns_completed_and_cancels_rest() {
        let exec = executor(ScriptedGateway::new(|worker, _| match worker.as_str() {
            "fast" => Script::text("done"),
            _ => Script::Hang,
        }));
        let recorder = Arc::new(Recorder::default());

        let forcer = recorder.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(40)).await;
            forcer.force.store(true, Ordering::SeqCst);
        });

        let report = tokio::time::timeout(
            Duration::from_secs(5),
            exec.run(
                &[w("fast"), w("hang1"), w("hang2")],
                vec![Message::user("q")],
                recorder.clone(),
            ),
        )
        .await
        .expect("fan-out should return after force-finish");

        assert!(report.forced);
        assert_eq!(report.results, vec![(w("fast"), "done".to_string())]);
        assert_eq!(report.failed, vec![w("hang1"), w("hang2")]);
        assert_eq!(recorder.done_for(&w("hang1")), vec![WorkerOutcome::Cancelled]);
        assert_eq!(recorder.done.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_outcome_status_mapping() {
        assert_eq!(
            WorkerOutcome::Completed(String::new()).stream_status(),
            StreamStatus::Complete
        );
        assert_eq!(WorkerOutcome::Skipped.stream_status(), StreamStatus::Skipped);
        assert_eq!(WorkerOutcome::Cancelled.stream_status(), StreamStatus::Failed);
    }
}
