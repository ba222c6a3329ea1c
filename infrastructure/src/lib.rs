//! Infrastructure layer for llm-council
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the OpenRouter HTTP gateway, JSON file
//! persistence, the JSONL job event log, and configuration file loading.

pub mod config;
pub mod logging;
pub mod openrouter;
pub mod persistence;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileCouncilConfig, FileExecutionConfig,
    FileOutputConfig, FileProviderConfig, FileStorageConfig,
};
pub use logging::JsonlJobEventLogger;
pub use openrouter::{OpenRouterError, OpenRouterGateway, OpenRouterSettings};
pub use persistence::{JsonConversationStore, JsonJobRepository};
