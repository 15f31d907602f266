//! Shared types for duet-core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Parse a stored role; unknown values are rejected
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn in a conversation; immutable once appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    /// A user message stamped with the current time
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, now_millis())
    }

    /// An assistant message stamped no earlier than `not_before`
    pub fn assistant_after(content: impl Into<String>, not_before: i64) -> Self {
        Self::new(Role::Assistant, content, now_millis().max(not_before))
    }
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A user's chat history, in append order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// How many of `messages` the store held when this copy was read or last saved
    #[serde(skip)]
    pub persisted_len: usize,
}

impl Conversation {
    /// A fresh, empty conversation with a random id
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            persisted_len: 0,
        }
    }

    /// Append a message; history is never rewritten
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Messages appended since the copy was read from the store
    pub fn unsaved(&self) -> &[Message] {
        &self.messages[self.persisted_len.min(self.messages.len())..]
    }

    /// Record that every message is now in the store
    pub fn mark_persisted(&mut self) {
        self.persisted_len = self.messages.len();
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            message_count: self.messages.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Listing entry for a conversation, without its messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub name: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display_and_parse() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::parse("assistant"), Some(Role::Assistant));
        assert_eq!(Role::parse("system"), None);
    }

    #[test]
    fn test_message_serialize() {
        let msg = Message::new(Role::User, "hi", 1_700_000_000_000);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "user", "content": "hi", "timestamp": 1_700_000_000_000i64})
        );
    }

    #[test]
    fn test_assistant_timestamp_not_before_user() {
        let future = now_millis() + 60_000;
        let msg = Message::assistant_after("reply", future);
        assert_eq!(msg.timestamp, future);
        assert_eq!(msg.role, Role::Assistant);
    }

    #[test]
    fn test_conversation_append_order() {
        let mut conv = Conversation::new("alice", "New Chat");
        conv.append(Message::user("first"));
        conv.append(Message::assistant_after("second", 0));
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].content, "first");
        assert_eq!(conv.messages[1].role, Role::Assistant);
        assert_eq!(conv.summary().message_count, 2);
    }

    #[test]
    fn test_unsaved_tracks_persisted_len() {
        let mut conv = Conversation::new("alice", "Chat");
        conv.append(Message::user("first"));
        assert_eq!(conv.unsaved().len(), 1);

        conv.mark_persisted();
        assert_eq!(conv.persisted_len, 1);
        assert!(conv.unsaved().is_empty());

        conv.append(Message::assistant_after("second", 0));
        assert_eq!(conv.unsaved()[0].content, "second");
    }

    #[test]
    fn test_persisted_len_not_serialized() {
        let mut conv = Conversation::new("alice", "Chat");
        conv.append(Message::user("hi"));
        conv.mark_persisted();

        let json = serde_json::to_value(&conv).unwrap();
        assert!(json.get("persisted_len").is_none());

        let back: Conversation = serde_json::from_value(json).unwrap();
        assert_eq!(back.persisted_len, 0);
    }
}
