//! File-backed persistence adapters

mod json_conversation_store;
mod json_job_repository;

pub use json_conversation_store::JsonConversationStore;
pub use json_job_repository::JsonJobRepository;
