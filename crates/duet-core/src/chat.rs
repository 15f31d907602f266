//! Chat service - one user turn from load to save

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::orchestrator::ResponseOrchestrator;
use crate::store::ConversationStore;
use crate::types::{Conversation, ConversationSummary, Message};

/// Failures a chat caller has to handle; provider failures never show up here
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("conversation {conversation_id} not found")]
    ConversationNotFound { conversation_id: String },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Runs a prompt through the orchestrator and records both sides of the turn
pub struct ChatService {
    store: Arc<dyn ConversationStore>,
    orchestrator: Arc<ResponseOrchestrator>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ConversationStore>, orchestrator: Arc<ResponseOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &Arc<ResponseOrchestrator> {
        &self.orchestrator
    }

    /// Send `prompt` to a conversation and return the new assistant message.
    ///
    /// The user and assistant messages are saved together; if the save fails
    /// neither is persisted and the error is returned.
    pub async fn send(
        &self,
        owner_id: &str,
        conversation_id: &str,
        prompt: &str,
    ) -> Result<Message, ChatError> {
        let (message, _strategy) = self.send_detailed(owner_id, conversation_id, prompt).await?;
        Ok(message)
    }

    /// Like [`send`](Self::send), also naming the fallback step that answered
    pub async fn send_detailed(
        &self,
        owner_id: &str,
        conversation_id: &str,
        prompt: &str,
    ) -> Result<(Message, &'static str), ChatError> {
        let mut conversation = self
            .store
            .load(owner_id, conversation_id)
            .await?
            .ok_or_else(|| ChatError::ConversationNotFound {
                conversation_id: conversation_id.to_string(),
            })?;

        let user_msg = Message::user(prompt);
        let user_ts = user_msg.timestamp;
        conversation.append(user_msg);

        let outcome = self.orchestrator.generate_reply_detailed(prompt).await;
        debug!(
            "Conversation {} answered via '{}'",
            conversation_id, outcome.strategy
        );

        let assistant_msg = Message::assistant_after(outcome.text, user_ts);
        conversation.append(assistant_msg.clone());

        self.store.save(&mut conversation).await?;
        info!(
            "Conversation {} now has {} messages",
            conversation_id,
            conversation.messages.len()
        );

        Ok((assistant_msg, outcome.strategy))
    }

    /// Start a new conversation for `owner_id`
    pub async fn create(&self, owner_id: &str, name: &str) -> Result<Conversation, ChatError> {
        Ok(self.store.create(owner_id, name).await?)
    }

    /// List the owner's conversations
    pub async fn list(&self, owner_id: &str) -> Result<Vec<ConversationSummary>, ChatError> {
        Ok(self.store.list(owner_id).await?)
    }
}
