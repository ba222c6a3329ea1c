//! Scripted worker gateway shared by the use-case tests.

use crate::ports::worker_gateway::{FailureReason, StreamHandle, WorkerFailure, WorkerGateway};
use async_trait::async_trait;
use council_domain::{Message, StreamEvent, WorkerId};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// How a worker answers one call
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream `chunks`, sleeping `delay` before each
    Reply { chunks: Vec<String>, delay: Duration },
    /// Fail before any chunk
    Fail(FailureReason),
    /// Never answer
    Hang,
}

impl Script {
    pub fn text(text: &str) -> Self {
        Script::Reply {
            chunks: vec![text.to_string()],
            delay: Duration::ZERO,
        }
    }

    pub fn chunks(chunks: &[&str], delay: Duration) -> Self {
        Script::Reply {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            delay,
        }
    }
}

type Responder = dyn Fn(&WorkerId, &str) -> Script + Send + Sync;

/// Gateway whose answers are decided by a closure over (worker, prompt)
pub struct ScriptedGateway {
    responder: Box<Responder>,
    calls: Mutex<Vec<(WorkerId, String)>>,
}

impl ScriptedGateway {
    pub fn new(responder: impl Fn(&WorkerId, &str) -> Script + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(WorkerId, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl WorkerGateway for ScriptedGateway {
    async fn call(&self, worker: &WorkerId, messages: &[Message]) -> Result<String, WorkerFailure> {
        self.stream(worker, messages).await?.collect_text().await
    }

    async fn stream(
        &self,
        worker: &WorkerId,
        messages: &[Message],
    ) -> Result<StreamHandle, WorkerFailure> {
        let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.calls.lock().unwrap().push((worker.clone(), prompt.clone()));

        let (tx, rx) = mpsc::channel(16);
        match (self.responder)(worker, &prompt) {
            Script::Fail(reason) => {
                return Err(WorkerFailure::new(worker.clone(), reason, "scripted failure"));
            }
            Script::Reply { chunks, delay } => {
                tokio::spawn(async move {
                    for chunk in chunks {
                        tokio::time::sleep(delay).await;
                        if tx.send(StreamEvent::Delta(chunk)).await.is_err() {
                            return;
                        }
                    }
                    let _ = tx.send(StreamEvent::Completed(String::new())).await;
                });
            }
            Script::Hang => {
                tokio::spawn(async move { tx.closed().await });
            }
        }
        Ok(StreamHandle::new(worker.clone(), rx))
    }

    async fn available_models(&self) -> Result<Vec<WorkerId>, WorkerFailure> {
        Ok(Vec::new())
    }
}

pub fn w(s: &str) -> WorkerId {
    s.parse().unwrap()
}
