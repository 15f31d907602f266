//! Persistence layer for duet
//!
//! SQLite-backed [`duet_core::ConversationStore`]: one row per conversation,
//! one row per message, messages written in a single transaction per save.

pub mod sqlite;

pub use sqlite::SqliteConversationStore;
