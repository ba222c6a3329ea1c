//! OpenRouter worker gateway
//!
//! Talks to an OpenAI-compatible `chat/completions` endpoint. Only a connect
//! timeout is set; once connected a worker may take as long as it needs.

use super::error::{OpenRouterError, Result, truncate_body};
use super::sse::{SseDecoder, SseFrame};
use super::types::{ChatRequest, ChatResponse, ModelsResponse, StreamChunk};
use async_trait::async_trait;
use council_application::{StreamHandle, WorkerFailure, WorkerGateway};
use council_domain::{Message, StreamEvent, WorkerId};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Capacity of the chunk channel between the HTTP reader and the consumer
const STREAM_BUFFER: usize = 64;

/// Connection settings for [`OpenRouterGateway`]
#[derive(Debug, Clone)]
pub struct OpenRouterSettings {
    pub api_url: String,
    pub api_key: String,
    pub connect_timeout: Duration,
}

impl OpenRouterSettings {
    /// Read the key from `api_key_env`
    pub fn from_env(
        api_url: impl Into<String>,
        api_key_env: &str,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let api_key = std::env::var(api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OpenRouterError::MissingApiKey(api_key_env.to_string()))?;
        Ok(Self {
            api_url: api_url.into(),
            api_key,
            connect_timeout,
        })
    }
}

/// Models listing endpoint next to the completions endpoint
pub fn models_url(api_url: &str) -> String {
    match api_url.strip_suffix("/chat/completions") {
        Some(base) => format!("{}/models", base),
        None => format!("{}/models", api_url.trim_end_matches('/')),
    }
}

pub struct OpenRouterGateway {
    client: reqwest::Client,
    api_url: String,
    models_url: String,
    /// Reported as the failing worker when the listing fails
    models_endpoint: WorkerId,
    api_key: String,
}

impl OpenRouterGateway {
    pub fn new(settings: OpenRouterSettings) -> Result<Self> {
        reqwest::Url::parse(&settings.api_url)
            .map_err(|e| OpenRouterError::InvalidUrl(format!("{}: {}", settings.api_url, e)))?;
        let models_url = models_url(&settings.api_url);
        let models_endpoint = WorkerId::new(models_url.clone())
            .map_err(|e| OpenRouterError::InvalidUrl(e.to_string()))?;

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(OpenRouterError::Client)?;

        info!(api_url = %settings.api_url, "OpenRouterGateway initialized");

        Ok(Self {
            client,
            models_url,
            models_endpoint,
            api_url: settings.api_url,
            api_key: settings.api_key,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn post(
        &self,
        worker: &WorkerId,
        messages: &[Message],
        stream: bool,
    ) -> Result<reqwest::Response> {
        let body = ChatRequest {
            model: worker.as_str(),
            messages,
            stream,
        };
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        check_status(response).await
    }

    async fn complete(&self, worker: &WorkerId, messages: &[Message]) -> Result<String> {
        let response = self.post(worker, messages, false).await?;
        let text = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&text)?;
        parsed.into_content().ok_or_else(|| {
            OpenRouterError::UnexpectedResponse(format!(
                "no choices in response: {}",
                truncate_body(&text)
            ))
        })
    }

    async fn list_models(&self) -> Result<Vec<WorkerId>> {
        let response = self
            .client
            .get(&self.models_url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let response = check_status(response).await?;
        let listing: ModelsResponse = response.json().await?;
        Ok(listing
            .data
            .into_iter()
            .filter_map(|m| WorkerId::new(m.id).ok())
            .collect())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(OpenRouterError::Status {
        status: status.as_u16(),
        body: truncate_body(&body),
    })
}

/// Read SSE frames from `response` into `tx` until `[DONE]`, the end of the
/// body, or the receiver going away.
async fn pump(worker: WorkerId, response: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    let mut full = String::new();

    'read: loop {
        let frames = match body.next().await {
            Some(Ok(bytes)) => decoder.push(&bytes),
            Some(Err(e)) => {
                warn!(worker = %worker, error = %e, "Stream interrupted");
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
            None => {
                if let Some(SseFrame::Data(data)) = decoder.finish()
                    && !forward(&worker, &data, &tx, &mut full).await
                {
                    return;
                }
                break;
            }
        };

        for frame in frames {
            match frame {
                SseFrame::Done => break 'read,
                SseFrame::Data(data) => {
                    if !forward(&worker, &data, &tx, &mut full).await {
                        return;
                    }
                }
            }
        }
    }

    info!(worker = %worker, chars = full.len(), "Worker streamed");
    let _ = tx.send(StreamEvent::Completed(full)).await;
}

/// Handle one `data:` payload. Returns false when the stream must stop.
async fn forward(
    worker: &WorkerId,
    data: &str,
    tx: &mpsc::Sender<StreamEvent>,
    full: &mut String,
) -> bool {
    let chunk = match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(worker = %worker, error = %e, "Ignoring malformed chunk");
            return true;
        }
    };
    if let Some(error) = &chunk.error {
        warn!(worker = %worker, error = %error.message, "Provider error mid-stream");
        let _ = tx.send(StreamEvent::Error(error.message.clone())).await;
        return false;
    }
    let Some(content) = chunk.delta_content() else {
        return true;
    };
    full.push_str(content);
    if tx.send(StreamEvent::Delta(content.to_string())).await.is_err() {
        debug!(worker = %worker, "Stream receiver dropped");
        return false;
    }
    true
}

#[async_trait]
impl WorkerGateway for OpenRouterGateway {
    async fn call(
        &self,
        worker: &WorkerId,
        messages: &[Message],
    ) -> std::result::Result<String, WorkerFailure> {
        debug!(worker = %worker, "Calling worker");
        match self.complete(worker, messages).await {
            Ok(content) => {
                info!(worker = %worker, chars = content.len(), "Worker responded");
                Ok(content)
            }
            Err(e) => {
                warn!(worker = %worker, error = %e, "Worker call failed");
                Err(e.into_failure(worker))
            }
        }
    }

    async fn stream(
        &self,
        worker: &WorkerId,
        messages: &[Message],
    ) -> std::result::Result<StreamHandle, WorkerFailure> {
        debug!(worker = %worker, "Streaming worker");
        let response = self.post(worker, messages, true).await.map_err(|e| {
            warn!(worker = %worker, error = %e, "Worker stream failed to start");
            e.into_failure(worker)
        })?;

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(pump(worker.clone(), response, tx));
        Ok(StreamHandle::new(worker.clone(), rx))
    }

    async fn available_models(&self) -> std::result::Result<Vec<WorkerId>, WorkerFailure> {
        self.list_models().await.map_err(|e| {
            warn!(error = %e, "Could not list models");
            e.into_failure(&self.models_endpoint)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_application::FailureReason;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per connection
    async fn serve(status: &'static str, content_type: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let body = body.clone();
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    let head = format!(
                        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(body.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}/api/v1/chat/completions")
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn gateway(api_url: String) -> OpenRouterGateway {
        OpenRouterGateway::new(OpenRouterSettings {
            api_url,
            api_key: "test-key".to_string(),
            connect_timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    fn worker() -> WorkerId {
        "openai/gpt-4o".parse().unwrap()
    }

    #[test]
    fn test_models_url() {
        assert_eq!(
            models_url("https://openrouter.ai/api/v1/chat/completions"),
            "https://openrouter.ai/api/v1/models"
        );
        assert_eq!(models_url("http://localhost:8080/v1/"), "http://localhost:8080/v1/models");
    }

    #[test]
    fn test_rejects_invalid_url() {
        let result = OpenRouterGateway::new(OpenRouterSettings {
            api_url: "not a url".to_string(),
            api_key: "k".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        });
        assert!(matches!(result, Err(OpenRouterError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_call_returns_first_choice() {
        let url = serve(
            "200 OK",
            "application/json",
            r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}]}"#.to_string(),
        )
        .await;
        let reply = gateway(url).call(&worker(), &[Message::user("hi")]).await;
        assert_eq!(reply.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_stream_forwards_deltas_in_order() {
        let body = [
            ": OPENROUTER PROCESSING",
            "",
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            "",
            r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#,
            "",
            "data: not json",
            "",
            r#"data: {"choices":[{"delta":{"content":"lo"}}]}"#,
            "",
            "data: [DONE]",
            "",
        ]
        .join("\n");
        let url = serve("200 OK", "text/event-stream", body).await;

        let mut chunks = Vec::new();
        let text = gateway(url)
            .call_streaming(&worker(), &[Message::user("hi")], &mut |c| chunks.push(c.to_string()))
            .await
            .unwrap();

        assert_eq!(chunks, vec!["Hel", "lo"]);
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn test_mid_stream_error_fails_worker() {
        let body = [
            r#"data: {"choices":[{"delta":{"content":"par"}}]}"#,
            "",
            r#"data: {"error":{"message":"provider overloaded"}}"#,
            "",
        ]
        .join("\n");
        let url = serve("200 OK", "text/event-stream", body).await;

        let handle = gateway(url).stream(&worker(), &[Message::user("hi")]).await.unwrap();
        let failure = handle.collect_text().await.unwrap_err();
        assert_eq!(failure.reason, FailureReason::Unreachable);
        assert!(failure.detail.contains("provider overloaded"));
    }

    #[tokio::test]
    async fn test_http_error_is_rejected() {
        let url = serve("401 Unauthorized", "application/json", r#"{"error":"bad key"}"#.to_string()).await;
        let failure = gateway(url)
            .stream(&worker(), &[Message::user("hi")])
            .await
            .unwrap_err();
        assert_eq!(failure.reason, FailureReason::Rejected);
        assert!(failure.detail.contains("401"));
    }

    #[tokio::test]
    async fn test_missing_choices_is_malformed() {
        let url = serve("200 OK", "application/json", r#"{"id":"x"}"#.to_string()).await;
        let failure = gateway(url).call(&worker(), &[Message::user("hi")]).await.unwrap_err();
        assert_eq!(failure.reason, FailureReason::MalformedResponse);
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let failure = gateway(format!("http://{addr}/v1/chat/completions"))
            .call(&worker(), &[Message::user("hi")])
            .await
            .unwrap_err();
        assert_eq!(failure.reason, FailureReason::Unreachable);
    }

    #[tokio::test]
    async fn test_available_models() {
        let url = serve(
            "200 OK",
            "application/json",
            r#"{"data":[{"id":"openai/gpt-4o","name":"GPT-4o"},{"id":"anthropic/claude-3"}]}"#.to_string(),
        )
        .await;
        let models = gateway(url).available_models().await.unwrap();
        assert_eq!(models, vec![worker(), "anthropic/claude-3".parse().unwrap()]);
    }
}
