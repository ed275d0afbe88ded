// src/generate/mod.rs
//! Generation capability: prompt in, free-form text out, with an optional search tool.
//!
//! * `OpenAiGenerator`: OpenAI-compatible chat completions (OpenAI, Groq).
//! * `ScriptedGenerator`: canned replies for tests and `AI_TEST_MODE=mock`.
//! * `DisabledGenerator`: always returns `None`.

pub mod openai;
pub mod prompt;

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::ai::AiConfig;
use crate::model::SearchResult;
use crate::search::SearchOrchestrator;

pub use openai::OpenAiGenerator;

pub const TOOL_NAME: &str = "optimized_search";

/// One generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_message: String,
}

pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + 'a>>;

pub trait Generator: Send + Sync {
    /// Final assistant text. `Ok(None)` means the model produced nothing.
    ///
    /// When `tool` is given the model may run searches through it before answering.
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
        tool: Option<&'a SearchOrchestrator>,
    ) -> GenerateFuture<'a>;

    fn provider_name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn Generator>;

pub struct DisabledGenerator;

impl Generator for DisabledGenerator {
    fn generate<'a>(
        &'a self,
        _req: &'a GenerationRequest,
        _tool: Option<&'a SearchOrchestrator>,
    ) -> GenerateFuture<'a> {
        Box::pin(async { Ok(None) })
    }

    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Replays canned replies in order; the last one repeats once the queue runs dry.
///
/// With `with_search`, the tool is invoked with the given queries before replying,
/// the way a real model would call it.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Option<String>>>,
    last: Mutex<Option<String>>,
    search_queries: Vec<String>,
    delay: Option<Duration>,
    fail_with: Option<String>,
    pub requests: Mutex<Vec<GenerationRequest>>,
    pub searched: Mutex<Vec<SearchResult>>,
}

impl ScriptedGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self::with_replies(vec![Some(reply.into())])
    }

    /// Always answers with no content.
    pub fn empty() -> Self {
        Self::with_replies(vec![None])
    }

    pub fn with_replies(replies: Vec<Option<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    /// Every call fails at the transport level.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fail_with: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_search(mut self, queries: &[&str]) -> Self {
        self.search_queries = queries.iter().map(|q| q.to_string()).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn next_reply(&self) -> Option<String> {
        let popped = self.replies.lock().ok().and_then(|mut q| q.pop_front());
        match (popped, self.last.lock()) {
            (Some(reply), Ok(mut last)) => {
                *last = reply.clone();
                reply
            }
            (Some(reply), Err(_)) => reply,
            (None, Ok(last)) => last.clone(),
            (None, Err(_)) => None,
        }
    }
}

impl Generator for ScriptedGenerator {
    fn generate<'a>(
        &'a self,
        req: &'a GenerationRequest,
        tool: Option<&'a SearchOrchestrator>,
    ) -> GenerateFuture<'a> {
        Box::pin(async move {
            if let Ok(mut r) = self.requests.lock() {
                r.push(req.clone());
            }
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            if let Some(msg) = &self.fail_with {
                anyhow::bail!("{msg}");
            }
            if let (Some(orch), false) = (tool, self.search_queries.is_empty()) {
                let found = orch.search(self.search_queries.as_slice()).await;
                if let Ok(mut s) = self.searched.lock() {
                    s.extend(found);
                }
            }
            Ok(self.next_reply())
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Report returned by the mock generator: valid, neutral, no evidence.
pub const MOCK_REPORT: &str = r#"{"health_score": 50, "scientific_summary": "Mock analysis (no model call was made).", "user_scenario": [], "evidence": []}"#;

/// Factory following config and environment.
///
/// * `AI_TEST_MODE=mock` ⇒ scripted generator replying with [`MOCK_REPORT`].
/// * `enabled == false` ⇒ disabled.
/// * `openai` / `groq` with a key ⇒ [`OpenAiGenerator`].
pub fn build_generator(cfg: &AiConfig) -> DynGenerator {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(ScriptedGenerator::new(MOCK_REPORT));
    }
    if !cfg.enabled {
        return Arc::new(DisabledGenerator);
    }
    match cfg.provider.as_str() {
        "mock" => Arc::new(ScriptedGenerator::new(MOCK_REPORT)),
        "openai" | "groq" => {
            if cfg.api_key.trim().is_empty() {
                tracing::warn!(target: "pipeline", provider = %cfg.provider, "no api key; generation disabled");
                return Arc::new(DisabledGenerator);
            }
            match OpenAiGenerator::new(cfg) {
                Ok(g) => Arc::new(g),
                Err(e) => {
                    tracing::warn!(target: "pipeline", error = ?e, "generator init failed; generation disabled");
                    Arc::new(DisabledGenerator)
                }
            }
        }
        other => {
            tracing::warn!(target: "pipeline", provider = other, "unknown provider; generation disabled");
            Arc::new(DisabledGenerator)
        }
    }
}
