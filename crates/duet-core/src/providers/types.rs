//! Provider-agnostic types for single-turn text generation

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Sampling temperature used for every provider call
pub const TEMPERATURE: f32 = 0.7;

/// Upper bound on generated output, in provider tokens
pub const MAX_OUTPUT_TOKENS: u32 = 150;

/// Generation parameters shared by all providers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    /// The fixed parameters every adapter sends
    pub const FIXED: Self = Self {
        temperature: TEMPERATURE,
        max_output_tokens: MAX_OUTPUT_TOKENS,
    };
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::FIXED
    }
}

/// Trait that all text-generation providers implement
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Human-readable provider name (e.g. "gemini", "cohere")
    fn provider_name(&self) -> &str;

    /// Model identifier (e.g. "gemini-2.0-flash")
    fn model(&self) -> &str;

    /// Send one prompt as a single user turn and return the extracted text.
    ///
    /// A missing text field in an otherwise valid response is `Ok("")`;
    /// transport and status failures are errors.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Outcome of one provider call once errors have been absorbed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Trimmed, non-empty text
    Text(String),
    /// The provider failed or produced nothing
    Empty,
}

impl Completion {
    /// Build a completion from raw text, treating blank text as empty
    pub fn from_text(text: impl AsRef<str>) -> Self {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            Self::Empty
        } else {
            Self::Text(trimmed.to_string())
        }
    }

    /// Absorb a provider result, logging the failure
    pub fn from_result(provider: &str, result: Result<String>) -> Self {
        match result {
            Ok(text) => Self::from_text(text),
            Err(e) => {
                warn!("Provider {} failed, treating as empty: {:#}", provider, e);
                Self::Empty
            }
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Text or the empty string, for prompt composition
    pub fn as_str(&self) -> &str {
        self.text().unwrap_or("")
    }

    pub fn into_option(self) -> Option<String> {
        match self {
            Self::Text(t) => Some(t),
            Self::Empty => None,
        }
    }
}

/// Call a provider and degrade any failure to [`Completion::Empty`]
pub async fn generate_or_empty(generator: &dyn TextGenerator, prompt: &str) -> Completion {
    debug!(
        "Calling {} ({}) with {} chars",
        generator.provider_name(),
        generator.model(),
        prompt.len()
    );
    let result = generator.generate(prompt).await;
    let completion = Completion::from_result(generator.provider_name(), result);
    debug!(
        "{} returned {} chars",
        generator.provider_name(),
        completion.as_str().len()
    );
    completion
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct Fixed(&'static str);

    #[async_trait]
    impl TextGenerator for Fixed {
        fn provider_name(&self) -> &str {
            "fixed"
        }
        fn model(&self) -> &str {
            "fixed-1"
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl TextGenerator for Broken {
        fn provider_name(&self) -> &str {
            "broken"
        }
        fn model(&self) -> &str {
            "broken-1"
        }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    #[test]
    fn test_fixed_params() {
        let params = GenerationParams::default();
        assert_eq!(params.temperature, 0.7);
        assert_eq!(params.max_output_tokens, 150);
    }

    #[test]
    fn test_completion_from_text_trims() {
        assert_eq!(
            Completion::from_text("  hello \n"),
            Completion::Text("hello".to_string())
        );
        assert_eq!(Completion::from_text("   "), Completion::Empty);
        assert_eq!(Completion::from_text(""), Completion::Empty);
    }

    #[test]
    fn test_completion_from_error_is_empty() {
        let c = Completion::from_result("x", Err(anyhow!("429 rate limit")));
        assert!(c.is_empty());
        assert_eq!(c.as_str(), "");
        assert_eq!(c.into_option(), None);
    }

    #[tokio::test]
    async fn test_generate_or_empty() {
        assert_eq!(
            generate_or_empty(&Fixed(" hi "), "p").await,
            Completion::Text("hi".to_string())
        );
        assert_eq!(generate_or_empty(&Fixed(""), "p").await, Completion::Empty);
        assert_eq!(generate_or_empty(&Broken, "p").await, Completion::Empty);
    }
}
