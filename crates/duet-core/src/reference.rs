//! Reference lookup - encyclopedia summaries used as a late fallback

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org/api/rest_v1";

/// Why a reference lookup produced no summary
#[derive(Debug, Error)]
pub enum LookupError {
    /// No entry for the topic, or the entry has no summary
    #[error("no reference entry for '{0}'")]
    NotFound(String),
    /// Network or decoding failure
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// A source of short topic summaries
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Human-readable source name
    fn source_name(&self) -> &str;

    /// Look up a summary for `topic`
    async fn lookup(&self, topic: &str) -> Result<String, LookupError>;
}

/// Trim and collapse whitespace runs into `_`, the title separator
pub fn normalize_topic(topic: &str) -> String {
    topic.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Wikipedia page-summary client
pub struct WikipediaLookup {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for WikipediaLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WikipediaLookup")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl WikipediaLookup {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("duet/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build `{base}/page/summary/{title}` with the title escaped as one path segment
    fn summary_url(base_url: &str, title: &str) -> anyhow::Result<Url> {
        let mut url = Url::parse(base_url)
            .with_context(|| format!("Invalid reference base URL: {}", base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Reference base URL cannot be a base: {}", base_url))?
            .pop_if_empty()
            .push("page")
            .push("summary")
            .push(title);
        Ok(url)
    }
}

impl Default for WikipediaLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReferenceSource for WikipediaLookup {
    fn source_name(&self) -> &str {
        "wikipedia"
    }

    async fn lookup(&self, topic: &str) -> Result<String, LookupError> {
        let title = normalize_topic(topic);
        if title.is_empty() {
            return Err(LookupError::NotFound(topic.to_string()));
        }

        let url = Self::summary_url(&self.base_url, &title)?;
        debug!("Wikipedia lookup: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request to Wikipedia")?;

        let status = response.status();
        if !status.is_success() {
            debug!("Wikipedia returned {} for '{}'", status, title);
            return Err(LookupError::NotFound(title));
        }

        let summary: SummaryResponse = response
            .json()
            .await
            .context("Failed to parse Wikipedia summary")?;

        match summary.extract {
            Some(extract) if !extract.trim().is_empty() => Ok(extract.trim().to_string()),
            _ => Err(LookupError::NotFound(title)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    extract: Option<String>,
}
