// src/search/providers/tavily.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::SearchResult;
use crate::search::types::{SearchProvider, SearchRequest};

pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";
pub const ENV_TAVILY_API_KEY: &str = "TAVILY_API_KEY";

#[derive(Serialize)]
struct TavilyReq<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    include_domains: &'a [String],
    include_answer: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResp {
    #[serde(default)]
    results: Vec<TavilyItem>,
}

#[derive(Debug, Deserialize)]
struct TavilyItem {
    url: Option<String>,
    title: Option<String>,
    content: Option<String>,
}

/// Tavily web search, restricted server-side via `include_domains`.
pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilyProvider {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("evidence-auditor/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building tavily http client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: TAVILY_BASE_URL.to_string(),
        })
    }

    /// Reads `TAVILY_API_KEY`; fails when it is missing or blank.
    pub fn from_env(timeout: Duration) -> Result<Self> {
        let key = std::env::var(ENV_TAVILY_API_KEY)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("Missing {ENV_TAVILY_API_KEY} env var"))?;
        Self::new(key, timeout)
    }

    /// Point at a different host (used by tests with a local server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn parse(resp: TavilyResp) -> Vec<SearchResult> {
        resp.results
            .into_iter()
            .filter_map(|it| {
                let url = it.url.filter(|u| !u.trim().is_empty())?;
                Some(SearchResult {
                    url,
                    title: it.title.unwrap_or_default(),
                    content: it.content.unwrap_or_default(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchResult>> {
        let t0 = std::time::Instant::now();
        let body = TavilyReq {
            api_key: &self.api_key,
            query: &req.query,
            max_results: req.max_results,
            search_depth: &req.search_depth,
            include_domains: &req.domain_allow_list,
            include_answer: false,
        };

        let resp = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .context("tavily http post()")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("tavily returned HTTP {status}"));
        }
        let parsed: TavilyResp = resp.json().await.context("tavily .json()")?;
        let out = Self::parse(parsed);

        histogram!("search_provider_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "tavily"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_items_without_url() {
        let raw = r#"{"results": [
            {"url": "https://www.cdc.gov/salt", "title": "Salt", "content": "sodium"},
            {"title": "no url"},
            {"url": "  ", "content": "blank url"},
            {"url": "https://who.int/x"}
        ]}"#;
        let resp: TavilyResp = serde_json::from_str(raw).unwrap();
        let out = TavilyProvider::parse(resp);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].title, "");
        assert_eq!(out[1].content, "");
    }

    #[test]
    fn missing_results_key_is_empty() {
        let resp: TavilyResp = serde_json::from_str("{}").unwrap();
        assert!(TavilyProvider::parse(resp).is_empty());
    }
}
