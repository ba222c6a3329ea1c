//! Conversation title generation

use crate::ports::worker_gateway::WorkerGateway;
use council_domain::{Message, NEW_CONVERSATION_TITLE, PromptTemplate, UserQuery, WorkerId, clean_title};
use tracing::{debug, warn};

/// Ask `model` for a short title. Never fails: any error yields
/// "New Conversation".
pub async fn generate_title<G: WorkerGateway + ?Sized>(
    gateway: &G,
    model: &WorkerId,
    query: &UserQuery,
) -> String {
    let messages = [Message::user(PromptTemplate::title_prompt(query))];
    match gateway.call(model, &messages).await {
        Ok(raw) => {
            let title = clean_title(&raw);
            debug!(title = %title, "Generated conversation title");
            title
        }
        Err(e) => {
            warn!(error = %e, "Title generation failed");
            NEW_CONVERSATION_TITLE.to_string()
        }
    }
}
