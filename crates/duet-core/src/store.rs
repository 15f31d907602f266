//! Conversation persistence seam

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::types::{Conversation, ConversationSummary};

/// Loads and saves conversations keyed by owner and id
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Create and persist an empty conversation
    async fn create(&self, owner_id: &str, name: &str) -> Result<Conversation>;

    /// Load a conversation; `None` if it does not exist or belongs to someone else
    async fn load(&self, owner_id: &str, conversation_id: &str) -> Result<Option<Conversation>>;

    /// Conversations owned by `owner_id`, most recently updated first
    async fn list(&self, owner_id: &str) -> Result<Vec<ConversationSummary>>;

    /// Persist every message appended since the copy was loaded, in one
    /// atomic write, and mark them persisted.
    ///
    /// Fails without writing anything if the stored conversation changed
    /// after this copy was loaded, so a concurrent turn is never lost.
    async fn save(&self, conversation: &mut Conversation) -> Result<()>;
}

/// Process-local store, used by one-shot commands and tests
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: Arc<RwLock<HashMap<String, Conversation>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations across all owners
    pub async fn count(&self) -> usize {
        self.conversations.read().await.len()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn create(&self, owner_id: &str, name: &str) -> Result<Conversation> {
        let conversation = Conversation::new(owner_id, name);
        let mut conversations = self.conversations.write().await;
        conversations.insert(conversation.id.clone(), conversation.clone());
        info!("Created conversation '{}' ({})", name, conversation.id);
        Ok(conversation)
    }

    async fn load(&self, owner_id: &str, conversation_id: &str) -> Result<Option<Conversation>> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(conversation_id)
            .filter(|c| c.owner_id == owner_id)
            .map(|c| {
                let mut copy = c.clone();
                copy.mark_persisted();
                copy
            }))
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<ConversationSummary>> {
        let conversations = self.conversations.read().await;
        let mut list: Vec<ConversationSummary> = conversations
            .values()
            .filter(|c| c.owner_id == owner_id)
            .map(Conversation::summary)
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    async fn save(&self, conversation: &mut Conversation) -> Result<()> {
        let mut conversations = self.conversations.write().await;
        let existing = match conversations.get_mut(&conversation.id) {
            Some(existing) if existing.owner_id == conversation.owner_id => existing,
            _ => return Err(anyhow!("Conversation {} does not exist", conversation.id)),
        };

        if existing.messages.len() != conversation.persisted_len {
            return Err(anyhow!(
                "Conversation {} changed since it was loaded ({} stored, expected {})",
                conversation.id,
                existing.messages.len(),
                conversation.persisted_len
            ));
        }

        let added = conversation.unsaved().len();
        *existing = conversation.clone();
        conversation.mark_persisted();
        debug!(
            "Saved conversation {} ({} new messages)",
            conversation.id, added
        );
        Ok(())
    }
}
