//! Fallback ladder - ordered strategies tried until one yields a reply
//!
//! The default ladder, in order:
//! 1. [`MergeResponses`]: synthesize both provider answers through the secondary provider
//! 2. [`FirstAvailable`]: the raw primary answer, else the raw secondary answer
//! 3. [`CodeSnippet`]: for code-looking prompts, ask for a simple snippet
//! 4. [`ReferenceSummary`]: an encyclopedia summary for the prompt as a topic
//! 5. [`GenericReply`]: a fixed reply that always succeeds

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::classifier::{KeywordPredicate, PromptPredicate};
use crate::providers::{Completion, TextGenerator, generate_or_empty};
use crate::reference::ReferenceSource;

/// External collaborators the ladder may call
#[derive(Clone)]
pub struct Providers {
    pub primary: Arc<dyn TextGenerator>,
    /// Also used for the merge and code-snippet calls
    pub secondary: Arc<dyn TextGenerator>,
    pub reference: Arc<dyn ReferenceSource>,
    pub code_request: Arc<dyn PromptPredicate>,
}

impl Providers {
    pub fn new(
        primary: Arc<dyn TextGenerator>,
        secondary: Arc<dyn TextGenerator>,
        reference: Arc<dyn ReferenceSource>,
    ) -> Self {
        Self {
            primary,
            secondary,
            reference,
            code_request: Arc::new(KeywordPredicate::code_request()),
        }
    }

    /// Replace the code-request classifier
    pub fn with_code_predicate(mut self, predicate: Arc<dyn PromptPredicate>) -> Self {
        self.code_request = predicate;
        self
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("primary", &self.primary.provider_name())
            .field("secondary", &self.secondary.provider_name())
            .field("reference", &self.reference.source_name())
            .finish()
    }
}

/// Everything a strategy may look at: the prompt and the fan-out results
pub struct LadderContext<'a> {
    pub prompt: &'a str,
    pub primary: &'a Completion,
    pub secondary: &'a Completion,
    pub providers: &'a Providers,
}

/// One rung of the ladder
#[async_trait]
pub trait FallbackStrategy: Send + Sync {
    /// Stable name used in logs and [`crate::ReplyOutcome`]
    fn name(&self) -> &'static str;

    /// `Some` with non-empty text ends the ladder
    async fn attempt(&self, ctx: &LadderContext<'_>) -> Option<String>;
}

/// The ladder in its fixed priority order
pub fn default_ladder() -> Vec<Box<dyn FallbackStrategy>> {
    vec![
        Box::new(MergeResponses),
        Box::new(FirstAvailable),
        Box::new(CodeSnippet),
        Box::new(ReferenceSummary),
        Box::new(GenericReply),
    ]
}

/// Composite prompt presenting both candidate answers
pub fn merge_prompt(
    primary_name: &str,
    primary: &Completion,
    secondary_name: &str,
    secondary: &Completion,
) -> String {
    format!(
        "Response A ({}):\n{}\n\nResponse B ({}):\n{}",
        primary_name,
        primary.as_str(),
        secondary_name,
        secondary.as_str()
    )
    .trim()
    .to_string()
}

/// Prompt asking for a simple code snippet
pub fn code_prompt(prompt: &str) -> String {
    format!("Write a simple {}.", prompt.trim())
}

/// The reply used when nothing else produced text
pub fn generic_reply(prompt: &str) -> String {
    format!(
        "I'm not sure about \"{}\", but I'm here to help with anything else!",
        prompt
    )
}

/// Ask the secondary provider to synthesize both answers
pub struct MergeResponses;

#[async_trait]
impl FallbackStrategy for MergeResponses {
    fn name(&self) -> &'static str {
        "merge"
    }

    async fn attempt(&self, ctx: &LadderContext<'_>) -> Option<String> {
        if ctx.primary.is_empty() && ctx.secondary.is_empty() {
            debug!("Both providers empty, skipping merge");
            return None;
        }
        let combined = merge_prompt(
            ctx.providers.primary.provider_name(),
            ctx.primary,
            ctx.providers.secondary.provider_name(),
            ctx.secondary,
        );
        generate_or_empty(ctx.providers.secondary.as_ref(), &combined)
            .await
            .into_option()
    }
}

/// Raw fan-out result, primary first
pub struct FirstAvailable;

#[async_trait]
impl FallbackStrategy for FirstAvailable {
    fn name(&self) -> &'static str {
        "first_available"
    }

    async fn attempt(&self, ctx: &LadderContext<'_>) -> Option<String> {
        ctx.primary
            .text()
            .or_else(|| ctx.secondary.text())
            .map(str::to_string)
    }
}

/// Simple code snippet for prompts the classifier flags as code requests
pub struct CodeSnippet;

#[async_trait]
impl FallbackStrategy for CodeSnippet {
    fn name(&self) -> &'static str {
        "code_snippet"
    }

    async fn attempt(&self, ctx: &LadderContext<'_>) -> Option<String> {
        if !ctx.providers.code_request.matches(ctx.prompt) {
            return None;
        }
        debug!("Prompt looks like a code request");
        generate_or_empty(ctx.providers.secondary.as_ref(), &code_prompt(ctx.prompt))
            .await
            .into_option()
    }
}

/// Reference summary for the raw prompt as a topic
pub struct ReferenceSummary;

#[async_trait]
impl FallbackStrategy for ReferenceSummary {
    fn name(&self) -> &'static str {
        "reference"
    }

    async fn attempt(&self, ctx: &LadderContext<'_>) -> Option<String> {
        match ctx.providers.reference.lookup(ctx.prompt).await {
            Ok(summary) => Completion::from_text(summary).into_option(),
            Err(e) => {
                debug!(
                    "Reference lookup via {} failed: {}",
                    ctx.providers.reference.source_name(),
                    e
                );
                None
            }
        }
    }
}

/// Always answers with [`generic_reply`]
pub struct GenericReply;

impl GenericReply {
    pub const NAME: &'static str = "generic";
}

#[async_trait]
impl FallbackStrategy for GenericReply {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn attempt(&self, ctx: &LadderContext<'_>) -> Option<String> {
        Some(generic_reply(ctx.prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedGenerator, ScriptedReference};

    fn providers(
        secondary: Arc<ScriptedGenerator>,
        reference: Arc<ScriptedReference>,
    ) -> Providers {
        Providers::new(ScriptedGenerator::replying("alpha", ""), secondary, reference)
    }

    #[test]
    fn test_default_ladder_order() {
        let names: Vec<_> = default_ladder().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["merge", "first_available", "code_snippet", "reference", "generic"]
        );
    }

    #[test]
    fn test_merge_prompt_labels_both_sides() {
        let p = merge_prompt(
            "gemini",
            &Completion::Text("one".to_string()),
            "cohere",
            &Completion::Text("two".to_string()),
        );
        assert_eq!(p, "Response A (gemini):\none\n\nResponse B (cohere):\ntwo");
    }

    #[test]
    fn test_merge_prompt_with_empty_side() {
        let p = merge_prompt("a", &Completion::Text("x".to_string()), "b", &Completion::Empty);
        assert_eq!(p, "Response A (a):\nx\n\nResponse B (b):");
    }

    #[test]
    fn test_code_prompt_and_generic_reply() {
        assert_eq!(
            code_prompt(" python function to sort "),
            "Write a simple python function to sort."
        );
        assert_eq!(
            generic_reply("xyzzy123nonexistent"),
            "I'm not sure about \"xyzzy123nonexistent\", but I'm here to help with anything else!"
        );
        assert!(!generic_reply("").is_empty());
    }

    #[tokio::test]
    async fn test_merge_skipped_when_both_empty() {
        let secondary = ScriptedGenerator::replying("beta", "merged");
        let p = providers(secondary.clone(), ScriptedReference::missing());
        let ctx = LadderContext {
            prompt: "q",
            primary: &Completion::Empty,
            secondary: &Completion::Empty,
            providers: &p,
        };
        assert_eq!(MergeResponses.attempt(&ctx).await, None);
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_first_available_prefers_primary() {
        let p = providers(ScriptedGenerator::replying("beta", ""), ScriptedReference::missing());
        let a = Completion::Text("from a".to_string());
        let b = Completion::Text("from b".to_string());

        let ctx = LadderContext {
            prompt: "q",
            primary: &a,
            secondary: &b,
            providers: &p,
        };
        assert_eq!(FirstAvailable.attempt(&ctx).await.as_deref(), Some("from a"));

        let ctx = LadderContext {
            prompt: "q",
            primary: &Completion::Empty,
            secondary: &b,
            providers: &p,
        };
        assert_eq!(FirstAvailable.attempt(&ctx).await.as_deref(), Some("from b"));

        let ctx = LadderContext {
            prompt: "q",
            primary: &Completion::Empty,
            secondary: &Completion::Empty,
            providers: &p,
        };
        assert_eq!(FirstAvailable.attempt(&ctx).await, None);
    }

    #[tokio::test]
    async fn test_code_snippet_respects_predicate() {
        let secondary = ScriptedGenerator::new("beta", |p: &str| Ok(format!("code for: {}", p)));
        let never = Arc::new(|_: &str| false);
        let p =
            providers(secondary.clone(), ScriptedReference::missing()).with_code_predicate(never);
        let ctx = LadderContext {
            prompt: "python function",
            primary: &Completion::Empty,
            secondary: &Completion::Empty,
            providers: &p,
        };
        assert_eq!(CodeSnippet.attempt(&ctx).await, None);
        assert_eq!(secondary.calls(), 0);

        let p = providers(secondary.clone(), ScriptedReference::missing());
        let ctx = LadderContext { providers: &p, ..ctx };
        assert_eq!(
            CodeSnippet.attempt(&ctx).await.as_deref(),
            Some("code for: Write a simple python function.")
        );
    }

    #[tokio::test]
    async fn test_reference_summary_found_and_missing() {
        let reference = ScriptedReference::found("A tower in Paris.");
        let p = providers(ScriptedGenerator::replying("beta", ""), reference.clone());
        let ctx = LadderContext {
            prompt: "Eiffel Tower",
            primary: &Completion::Empty,
            secondary: &Completion::Empty,
            providers: &p,
        };
        assert_eq!(
            ReferenceSummary.attempt(&ctx).await.as_deref(),
            Some("A tower in Paris.")
        );
        assert_eq!(reference.topics(), vec!["Eiffel Tower".to_string()]);

        let p = providers(ScriptedGenerator::replying("beta", ""), ScriptedReference::missing());
        let ctx = LadderContext { providers: &p, ..ctx };
        assert_eq!(ReferenceSummary.attempt(&ctx).await, None);
    }
}
