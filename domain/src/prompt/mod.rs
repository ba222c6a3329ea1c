//! Prompt domain
//!
//! Templates for each stage of the council flow, the title request, and the
//! debate moderator.

mod template;

pub use template::{NEW_CONVERSATION_TITLE, PromptTemplate, clean_title};
