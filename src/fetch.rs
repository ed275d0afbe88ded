// src/fetch.rs
//! Page fetcher: URL → lower-cased, whitespace-collapsed visible text.
//!
//! Unreachable in any way (status >= 400, timeout, DNS, connection error, empty body)
//! yields `""`. Callers only see a boolean distinction through emptiness.

use async_trait::async_trait;
use metrics::{counter, histogram};
use scraper::Html;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::FetchConfig;
use crate::text::collapse_whitespace;

/// Elements whose text never counts as page content.
pub const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "nav", "footer", "header", "aside"];

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Plain text of the page, or empty when it could not be retrieved.
    async fn fetch(&self, url: &str) -> String;
}

/// Visible text of an HTML document, lower-cased and whitespace-collapsed.
///
/// Text nodes are concatenated as-is, so words split by inline tags stay whole.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut buf = String::with_capacity(html.len() / 2);
    for node in doc.tree.root().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !skipped {
            buf.push_str(text);
        }
    }
    collapse_whitespace(&buf).to_lowercase()
}

/// reqwest-backed fetcher with a browser user agent, redirects followed.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(cfg: &FetchConfig) -> anyhow::Result<Self> {
        let timeout = cfg.timeout();
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client, timeout })
    }

    async fn fetch_inner(&self, url: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;
        let status = resp.status();
        if status.as_u16() >= 400 {
            return Err(format!("HTTP {status}"));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| format!("body read failed: {e}"))?;
        Ok(html_to_text(&body))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> String {
        let t0 = std::time::Instant::now();
        // reqwest enforces the same timeout; this guards slow body streaming too.
        let res = match tokio::time::timeout(self.timeout, self.fetch_inner(url)).await {
            Ok(r) => r,
            Err(_) => Err(format!("timeout after {}s", self.timeout.as_secs())),
        };
        histogram!("fetch_duration_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        match res {
            Ok(text) => {
                if text.is_empty() {
                    counter!("fetch_dead_total").increment(1);
                }
                text
            }
            Err(reason) => {
                tracing::debug!(target: "fetch", url, %reason, "unreachable");
                counter!("fetch_dead_total").increment(1);
                String::new()
            }
        }
    }
}

/// In-memory fetcher: URL → HTML body. Unknown URLs are unreachable.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> String {
        if let Ok(mut c) = self.calls.lock() {
            c.push(url.to_string());
        }
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        self.pages
            .get(url)
            .map(|html| html_to_text(html))
            .unwrap_or_default()
    }
}
