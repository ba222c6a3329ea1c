//! Worker gateway port
//!
//! Defines the interface for exchanging messages with remote model workers.

use async_trait::async_trait;
use council_domain::{Message, StreamEvent, WorkerId};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// Classification of a failed worker call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Transport failure: DNS, connect timeout, reset, broken stream
    Unreachable,
    /// The endpoint answered with a non-success status
    Rejected,
    /// The body could not be decoded into a reply
    MalformedResponse,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::Unreachable => "unreachable",
            FailureReason::Rejected => "rejected",
            FailureReason::MalformedResponse => "malformed-response",
        };
        f.write_str(s)
    }
}

/// A worker call that did not produce a reply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{worker} {reason}: {detail}")]
pub struct WorkerFailure {
    pub worker: WorkerId,
    pub reason: FailureReason,
    pub detail: String,
}

impl WorkerFailure {
    pub fn new(worker: WorkerId, reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            worker,
            reason,
            detail: detail.into(),
        }
    }

    pub fn unreachable(worker: WorkerId, detail: impl Into<String>) -> Self {
        Self::new(worker, FailureReason::Unreachable, detail)
    }

    pub fn rejected(worker: WorkerId, detail: impl Into<String>) -> Self {
        Self::new(worker, FailureReason::Rejected, detail)
    }

    pub fn malformed(worker: WorkerId, detail: impl Into<String>) -> Self {
        Self::new(worker, FailureReason::MalformedResponse, detail)
    }
}

/// Gateway to remote model workers
///
/// This port defines how the application layer talks to model endpoints.
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait WorkerGateway: Send + Sync {
    /// Single blocking exchange
    async fn call(&self, worker: &WorkerId, messages: &[Message]) -> Result<String, WorkerFailure>;

    /// Incremental exchange.
    ///
    /// Default implementation calls `call()` and wraps the result in a single
    /// `Completed` event.
    async fn stream(
        &self,
        worker: &WorkerId,
        messages: &[Message],
    ) -> Result<StreamHandle, WorkerFailure> {
        let result = self.call(worker, messages).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(StreamEvent::Completed(result)).await;
        Ok(StreamHandle::new(worker.clone(), rx))
    }

    /// Incremental exchange delivering each non-empty fragment to `on_chunk`
    /// in arrival order; returns the full text.
    async fn call_streaming(
        &self,
        worker: &WorkerId,
        messages: &[Message],
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, WorkerFailure> {
        let handle = self.stream(worker, messages).await?;
        handle.forward(on_chunk).await
    }

    /// Models the endpoint offers
    async fn available_models(&self) -> Result<Vec<WorkerId>, WorkerFailure>;
}

/// Handle for receiving streaming events from one worker call.
///
/// Wraps an `mpsc::Receiver<StreamEvent>`. Dropping the handle closes the
/// channel, which stops the producer.
#[derive(Debug)]
pub struct StreamHandle {
    worker: WorkerId,
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(worker: WorkerId, receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { worker, receiver }
    }

    /// Next event, or `None` once the producer is gone
    pub async fn next(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(self) -> Result<String, WorkerFailure> {
        self.forward(&mut |_| {}).await
    }

    /// Consume the stream, passing each non-empty fragment to `on_chunk`.
    ///
    /// A `Completed` event without preceding deltas is forwarded as one
    /// fragment.
    pub async fn forward(
        mut self,
        on_chunk: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, WorkerFailure> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => {
                    if !chunk.is_empty() {
                        on_chunk(&chunk);
                        full_text.push_str(&chunk);
                    }
                }
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        if !text.is_empty() {
                            on_chunk(&text);
                        }
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => {
                    return Err(WorkerFailure::unreachable(self.worker, e));
                }
            }
        }
        // Channel closed without Completed: return what we have
        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker() -> WorkerId {
        "test/model".parse().unwrap()
    }

    #[tokio::test]
    async fn test_forward_collects_deltas() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(StreamEvent::Delta("Hel".into())).await.unwrap();
        tx.send(StreamEvent::Delta(String::new())).await.unwrap();
        tx.send(StreamEvent::Delta("lo".into())).await.unwrap();
        tx.send(StreamEvent::Completed("ignored".into())).await.unwrap();
        drop(tx);

        let mut seen = Vec::new();
        let text = StreamHandle::new(worker(), rx)
            .forward(&mut |c| seen.push(c.to_string()))
            .await
            .unwrap();
        assert_eq!(text, "Hello");
        assert_eq!(seen, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn test_completed_only_is_one_fragment() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(StreamEvent::Completed("whole".into())).await.unwrap();
        let mut seen = Vec::new();
        let text = StreamHandle::new(worker(), rx)
            .forward(&mut |c| seen.push(c.to_string()))
            .await
            .unwrap();
        assert_eq!(text, "whole");
        assert_eq!(seen, vec!["whole"]);
    }

    #[tokio::test]
    async fn test_error_event_is_unreachable() {
        let (tx, rx) = mpsc::channel(2);
        tx.send(StreamEvent::Delta("part".into())).await.unwrap();
        tx.send(StreamEvent::Error("connection reset".into())).await.unwrap();
        let err = StreamHandle::new(worker(), rx).collect_text().await.unwrap_err();
        assert_eq!(err.reason, FailureReason::Unreachable);
        assert_eq!(err.to_string(), "test/model unreachable: connection reset");
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(FailureReason::MalformedResponse.to_string(), "malformed-response");
        assert_eq!(FailureReason::Rejected.to_string(), "rejected");
    }
}
