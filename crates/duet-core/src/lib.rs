//! duet-core - reply orchestration for the duet chat backend
//!
//! This crate provides:
//! - Gemini and Cohere adapters behind the [`TextGenerator`] trait
//! - A Wikipedia summary lookup behind [`ReferenceSource`]
//! - The [`ResponseOrchestrator`]: concurrent fan-out, merge, and a fallback
//!   ladder that always ends in a non-empty reply
//! - Conversation types, the [`ConversationStore`] seam, and [`ChatService`]

pub mod chat;
pub mod classifier;
pub mod ladder;
pub mod orchestrator;
pub mod providers;
pub mod reference;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for convenience
pub use chat::{ChatError, ChatService};
pub use classifier::{KeywordPredicate, PromptPredicate};
pub use ladder::{FallbackStrategy, LadderContext, Providers, default_ladder};
pub use orchestrator::{ReplyOutcome, ResponseOrchestrator};
pub use providers::{CohereGenerator, Completion, GeminiGenerator, TextGenerator};
pub use reference::{LookupError, ReferenceSource, WikipediaLookup};
pub use store::{ConversationStore, InMemoryConversationStore};
pub use types::{Conversation, ConversationSummary, Message, Role};
