//! OpenRouter adapter
//!
//! Implements the [`WorkerGateway`](council_application::WorkerGateway) port
//! over an OpenAI-compatible HTTP API, streaming replies as server-sent
//! events.

pub mod error;
pub mod gateway;
mod sse;
mod types;

pub use error::OpenRouterError;
pub use gateway::{
    DEFAULT_API_KEY_ENV, DEFAULT_API_URL, DEFAULT_CONNECT_TIMEOUT, OpenRouterGateway,
    OpenRouterSettings, models_url,
};
