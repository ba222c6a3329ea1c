//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application values
//! after validation.

use crate::openrouter::{DEFAULT_API_KEY_ENV, DEFAULT_API_URL};
use council_application::{CouncilConfig, ExecutionParams};
use council_domain::{DomainError, OutputFormat, WorkerId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Title worker used when none is configured
pub const DEFAULT_TITLE_MODEL: &str = "google/gemini-2.5-flash";

/// Configuration validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigValidationError {
    #[error("{0} cannot be 0")]
    ZeroInterval(&'static str),

    #[error("model name cannot be empty")]
    EmptyModelName,

    #[error("no council models configured (set [council] models or pass -m)")]
    NoModels,

    #[error("provider.api_url cannot be empty")]
    EmptyApiUrl,

    #[error(transparent)]
    Council(#[from] DomainError),
}

/// Raw council configuration (`[council]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCouncilConfig {
    /// Workers that answer and rank
    pub models: Vec<String>,
    /// Synthesizing worker; the first council model when unset
    pub chairman: Option<String>,
    /// Worker that names new conversations
    pub title_model: String,
}

impl Default for FileCouncilConfig {
    fn default() -> Self {
        Self {
            models: Vec::new(),
            chairman: None,
            title_model: DEFAULT_TITLE_MODEL.to_string(),
        }
    }
}

/// Raw provider configuration (`[provider]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    /// OpenAI-compatible chat completions endpoint
    pub api_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub connect_timeout_seconds: u64,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            connect_timeout_seconds: 60,
        }
    }
}

/// Raw execution timing (`[execution]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileExecutionConfig {
    pub force_poll_interval_ms: u64,
    pub cancel_grace_ms: u64,
    pub watch_interval_ms: u64,
    pub job_timeout_seconds: u64,
    pub job_retention_hours: u64,
    pub cleanup_interval_minutes: u64,
}

impl Default for FileExecutionConfig {
    fn default() -> Self {
        Self {
            force_poll_interval_ms: 500,
            cancel_grace_ms: 100,
            watch_interval_ms: 100,
            job_timeout_seconds: 600,
            job_retention_hours: 24,
            cleanup_interval_minutes: 60,
        }
    }
}

impl FileExecutionConfig {
    pub fn to_params(&self) -> ExecutionParams {
        ExecutionParams::default()
            .with_force_poll_interval(Duration::from_millis(self.force_poll_interval_ms))
            .with_cancel_grace(Duration::from_millis(self.cancel_grace_ms))
            .with_watch_interval(Duration::from_millis(self.watch_interval_ms))
            .with_job_timeout(Duration::from_secs(self.job_timeout_seconds))
            .with_job_retention(Duration::from_secs(self.job_retention_hours * 60 * 60))
            .with_cleanup_interval(Duration::from_secs(self.cleanup_interval_minutes * 60))
    }
}

/// Raw storage configuration (`[storage]`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStorageConfig {
    /// Root for jobs, conversations and logs; the platform data directory
    /// when unset
    pub data_dir: Option<PathBuf>,
}

impl FileStorageConfig {
    pub fn resolve_data_dir(&self) -> Option<PathBuf> {
        self.data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("llm-council")))
    }
}

/// Raw output configuration (`[output]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    pub format: Option<OutputFormat>,
    /// Enable colored terminal output
    pub color: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            format: None,
            color: true,
        }
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub council: FileCouncilConfig,
    pub provider: FileProviderConfig,
    pub execution: FileExecutionConfig,
    pub storage: FileStorageConfig,
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let names = self
            .council
            .models
            .iter()
            .chain(self.council.chairman.iter())
            .chain(std::iter::once(&self.council.title_model));
        if names.into_iter().any(|m| m.trim().is_empty()) {
            return Err(ConfigValidationError::EmptyModelName);
        }

        if self.provider.api_url.trim().is_empty() {
            return Err(ConfigValidationError::EmptyApiUrl);
        }

        let e = &self.execution;
        let intervals = [
            ("provider.connect_timeout_seconds", self.provider.connect_timeout_seconds),
            ("execution.force_poll_interval_ms", e.force_poll_interval_ms),
            ("execution.watch_interval_ms", e.watch_interval_ms),
            ("execution.job_timeout_seconds", e.job_timeout_seconds),
            ("execution.cleanup_interval_minutes", e.cleanup_interval_minutes),
        ];
        if let Some((field, _)) = intervals.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigValidationError::ZeroInterval(*field));
        }

        Ok(())
    }

    /// Council membership, with the first model standing in for a missing
    /// chairman
    pub fn council_config(&self) -> Result<CouncilConfig, ConfigValidationError> {
        let models = self
            .council
            .models
            .iter()
            .map(|m| WorkerId::new(m.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        let chairman = match &self.council.chairman {
            Some(c) => WorkerId::new(c.trim())?,
            None => models.first().cloned().ok_or(ConfigValidationError::NoModels)?,
        };
        let title_model = WorkerId::new(self.council.title_model.trim())?;
        Ok(CouncilConfig::new(models, chairman, title_model)?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.connect_timeout_seconds)
    }
}
