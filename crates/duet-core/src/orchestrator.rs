//! Response orchestrator - concurrent fan-out followed by the fallback ladder

use tracing::{debug, info, warn};

use crate::ladder::{
    FallbackStrategy, GenericReply, LadderContext, Providers, default_ladder, generic_reply,
};
use crate::providers::generate_or_empty;

/// A reply together with the ladder rung that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOutcome {
    pub text: String,
    pub strategy: &'static str,
}

/// Produces one assistant reply per prompt, never failing
pub struct ResponseOrchestrator {
    providers: Providers,
    /// Strategies in priority order (index 0 = tried first)
    ladder: Vec<Box<dyn FallbackStrategy>>,
}

impl std::fmt::Debug for ResponseOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseOrchestrator")
            .field("providers", &self.providers)
            .field("ladder", &self.ladder_names())
            .finish()
    }
}

impl ResponseOrchestrator {
    /// Create an orchestrator with the default ladder
    pub fn new(providers: Providers) -> Self {
        Self {
            providers,
            ladder: default_ladder(),
        }
    }

    /// Replace the ladder; the generic reply still backs it up if every rung is empty
    pub fn with_ladder(mut self, ladder: Vec<Box<dyn FallbackStrategy>>) -> Self {
        self.ladder = ladder;
        self
    }

    /// Names of the ladder rungs in evaluation order
    pub fn ladder_names(&self) -> Vec<&'static str> {
        self.ladder.iter().map(|s| s.name()).collect()
    }

    pub fn providers(&self) -> &Providers {
        &self.providers
    }

    /// Generate a non-empty reply for `prompt`
    pub async fn generate_reply(&self, prompt: &str) -> String {
        self.generate_reply_detailed(prompt).await.text
    }

    /// Generate a reply and report which strategy produced it
    pub async fn generate_reply_detailed(&self, prompt: &str) -> ReplyOutcome {
        let primary = self.providers.primary.as_ref();
        let secondary = self.providers.secondary.as_ref();

        // Both calls settle before the ladder starts
        let (primary_out, secondary_out) = tokio::join!(
            generate_or_empty(primary, prompt),
            generate_or_empty(secondary, prompt),
        );

        debug!(
            "{} returned: {:?}",
            primary.provider_name(),
            primary_out.as_str()
        );
        debug!(
            "{} returned: {:?}",
            secondary.provider_name(),
            secondary_out.as_str()
        );

        let ctx = LadderContext {
            prompt,
            primary: &primary_out,
            secondary: &secondary_out,
            providers: &self.providers,
        };

        for strategy in &self.ladder {
            match strategy.attempt(&ctx).await {
                Some(text) if !text.trim().is_empty() => {
                    info!(
                        "Reply produced by '{}' ({} chars)",
                        strategy.name(),
                        text.len()
                    );
                    return ReplyOutcome {
                        text,
                        strategy: strategy.name(),
                    };
                }
                _ => debug!("Strategy '{}' produced nothing", strategy.name()),
            }
        }

        warn!("Fallback ladder exhausted, using generic reply");
        ReplyOutcome {
            text: generic_reply(prompt),
            strategy: GenericReply::NAME,
        }
    }
}
