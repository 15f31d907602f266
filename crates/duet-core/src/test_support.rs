//! Scripted collaborators and a local HTTP stub for unit tests

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::providers::TextGenerator;
use crate::reference::{LookupError, ReferenceSource};

type Script = Box<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Generator whose reply is computed from the prompt; records every prompt
pub(crate) struct ScriptedGenerator {
    name: &'static str,
    script: Script,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub(crate) fn new(
        name: &'static str,
        script: impl Fn(&str) -> Result<String> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn replying(name: &'static str, text: &'static str) -> Arc<Self> {
        Self::new(name, move |_| Ok(text.to_string()))
    }

    pub(crate) fn failing(name: &'static str) -> Arc<Self> {
        Self::new(name, |_| Err(anyhow!("503 service unavailable")))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn provider_name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.script)(prompt)
    }
}

/// Reference source with a fixed answer; records every topic
pub(crate) struct ScriptedReference {
    summary: Option<String>,
    topics: Mutex<Vec<String>>,
}

impl ScriptedReference {
    pub(crate) fn found(summary: &str) -> Arc<Self> {
        Arc::new(Self {
            summary: Some(summary.to_string()),
            topics: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn missing() -> Arc<Self> {
        Arc::new(Self {
            summary: None,
            topics: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReferenceSource for ScriptedReference {
    fn source_name(&self) -> &str {
        "scripted"
    }

    async fn lookup(&self, topic: &str) -> Result<String, LookupError> {
        self.topics.lock().unwrap().push(topic.to_string());
        self.summary
            .clone()
            .ok_or_else(|| LookupError::NotFound(topic.to_string()))
    }
}

/// Serve `router` on an ephemeral loopback port and return its base URL
pub(crate) async fn spawn_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}
