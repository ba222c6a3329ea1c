//! Conversation store port
//!
//! Where user messages, council answers and titles are kept. The pipeline
//! writes the assistant message after every stage boundary so partial work
//! survives a crash.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use council_domain::{ConversationId, JobMetadata, Stage1Result, Stage2Result, Stage3Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum ConversationStoreError {
    #[error("Conversation not found: {0}")]
    NotFound(ConversationId),

    #[error("Invalid conversation id: {0:?}")]
    InvalidId(ConversationId),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The council's answer to one user message, possibly still incomplete
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub stage1: Option<Vec<Stage1Result>>,
    pub stage2: Option<Vec<Stage2Result>>,
    pub stage3: Option<Stage3Result>,
    pub metadata: Option<JobMetadata>,
    /// True until stage 3 has been written
    #[serde(default)]
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ConversationMessage {
    User { content: String },
    Assistant(AssistantMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub messages: Vec<ConversationMessage>,
}

impl Conversation {
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            title: council_domain::NEW_CONVERSATION_TITLE.to_string(),
            messages: Vec::new(),
        }
    }

    /// Store `message` as the answer to the latest user message.
    ///
    /// A trailing partial assistant message is replaced; anything else
    /// gets a new message appended.
    pub fn upsert_assistant(&mut self, message: AssistantMessage) {
        if let Some(ConversationMessage::Assistant(last)) = self.messages.last_mut()
            && last.partial
        {
            *last = message;
            return;
        }
        self.messages.push(ConversationMessage::Assistant(message));
    }
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append a user message, creating the conversation if needed
    async fn add_user_message(
        &self,
        id: &ConversationId,
        content: &str,
    ) -> Result<(), ConversationStoreError>;

    /// Write the current (partial or final) assistant message
    async fn save_partial_assistant_message(
        &self,
        id: &ConversationId,
        message: AssistantMessage,
    ) -> Result<(), ConversationStoreError>;

    async fn update_title(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> Result<(), ConversationStoreError>;

    async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, ConversationStoreError>;

    async fn message_count(&self, id: &ConversationId) -> Result<usize, ConversationStoreError> {
        Ok(self.get(id).await?.map_or(0, |c| c.messages.len()))
    }
}

/// Conversation store held in memory, for tests and one-shot CLI runs
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<ConversationId, Conversation>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn add_user_message(
        &self,
        id: &ConversationId,
        content: &str,
    ) -> Result<(), ConversationStoreError> {
        let mut conversations = self.conversations.lock().await;
        conversations
            .entry(id.clone())
            .or_insert_with(|| Conversation::new(id.clone()))
            .messages
            .push(ConversationMessage::User {
                content: content.to_string(),
            });
        Ok(())
    }

    async fn save_partial_assistant_message(
        &self,
        id: &ConversationId,
        message: AssistantMessage,
    ) -> Result<(), ConversationStoreError> {
        let mut conversations = self.conversations.lock().await;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| ConversationStoreError::NotFound(id.clone()))?;
        conversation.upsert_assistant(message);
        Ok(())
    }

    async fn update_title(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> Result<(), ConversationStoreError> {
        let mut conversations = self.conversations.lock().await;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| ConversationStoreError::NotFound(id.clone()))?;
        conversation.title = title.to_string();
        Ok(())
    }

    async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, ConversationStoreError> {
        Ok(self.conversations.lock().await.get(id).cloned())
    }
}
