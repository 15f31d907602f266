//! Text-generation provider adapters
//!
//! Each provider implements [`TextGenerator`] for a single user turn. The
//! orchestrator never sees provider errors directly: calls go through
//! [`generate_or_empty`], which folds every failure into [`Completion::Empty`].

pub mod cohere;
pub mod google;
pub mod types;

pub use cohere::CohereGenerator;
pub use google::GeminiGenerator;
pub use types::{Completion, GenerationParams, TextGenerator, generate_or_empty};
