// src/search/providers/mock.rs
//! Deterministic in-memory provider for tests and local runs.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::model::SearchResult;
use crate::search::types::{SearchProvider, SearchRequest};
use crate::text::normalize_query;

/// Answers by exact (normalized) query; unknown queries get `default_results`.
#[derive(Default)]
pub struct MockSearchProvider {
    responses: HashMap<String, Vec<SearchResult>>,
    default_results: Vec<SearchResult>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<SearchRequest>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, query: &str, results: Vec<SearchResult>) -> Self {
        self.responses.insert(normalize_query(query), results);
        self
    }

    pub fn with_default(mut self, results: Vec<SearchResult>) -> Self {
        self.default_results = results;
        self
    }

    /// Make this query return a provider error.
    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.insert(normalize_query(query));
        self
    }

    /// Sleep before answering, to exercise concurrency caps and deadlines.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|c| c.iter().map(|r| r.query.clone()).collect())
            .unwrap_or_default()
    }

    /// Highest number of concurrent `search` calls observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchResult>> {
        if let Ok(mut c) = self.calls.lock() {
            c.push(req.clone());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }

        let key = normalize_query(&req.query);
        if self.failing.contains(&key) {
            return Err(anyhow!("mock provider failure for '{}'", req.query));
        }
        Ok(self
            .responses
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.default_results.clone()))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
