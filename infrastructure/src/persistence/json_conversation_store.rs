//! Conversations as JSON files

use async_trait::async_trait;
use council_application::{
    AssistantMessage, Conversation, ConversationMessage, ConversationStore, ConversationStoreError,
};
use council_domain::ConversationId;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Conversations under `<dir>/<conversation id>.json`.
///
/// Every operation is a read-modify-write of one file, serialized by a
/// single lock.
pub struct JsonConversationStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ConversationStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File of `id`; ids that could name a path outside `dir` are rejected
    fn path_for(&self, id: &ConversationId) -> Result<PathBuf, ConversationStoreError> {
        let raw = id.as_str();
        if raw.is_empty() || raw.contains(['/', '\\', '\0']) || raw.contains("..") {
            return Err(ConversationStoreError::InvalidId(id.clone()));
        }
        Ok(self.dir.join(format!("{}.json", raw)))
    }

    async fn read(&self, id: &ConversationId) -> Result<Option<Conversation>, ConversationStoreError> {
        match fs::read(self.path_for(id)?).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, conversation: &Conversation) -> Result<(), ConversationStoreError> {
        let path = self.path_for(&conversation.id)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(conversation)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn modify(
        &self,
        id: &ConversationId,
        f: impl FnOnce(&mut Conversation),
    ) -> Result<(), ConversationStoreError> {
        let _guard = self.lock.lock().await;
        let mut conversation = self
            .read(id)
            .await?
            .ok_or_else(|| ConversationStoreError::NotFound(id.clone()))?;
        f(&mut conversation);
        self.write(&conversation).await
    }
}

#[async_trait]
impl ConversationStore for JsonConversationStore {
    async fn add_user_message(
        &self,
        id: &ConversationId,
        content: &str,
    ) -> Result<(), ConversationStoreError> {
        let _guard = self.lock.lock().await;
        let mut conversation = self
            .read(id)
            .await?
            .unwrap_or_else(|| Conversation::new(id.clone()));
        conversation.messages.push(ConversationMessage::User {
            content: content.to_string(),
        });
        self.write(&conversation).await
    }

    async fn save_partial_assistant_message(
        &self,
        id: &ConversationId,
        message: AssistantMessage,
    ) -> Result<(), ConversationStoreError> {
        self.modify(id, |c| c.upsert_assistant(message)).await
    }

    async fn update_title(
        &self,
        id: &ConversationId,
        title: &str,
    ) -> Result<(), ConversationStoreError> {
        self.modify(id, |c| c.title = title.to_string()).await
    }

    async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, ConversationStoreError> {
        let _guard = self.lock.lock().await;
        self.read(id).await
    }
}
