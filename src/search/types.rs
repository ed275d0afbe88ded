// src/search/types.rs
use anyhow::Result;

use crate::model::SearchResult;

/// What is sent to the external search provider for one query.
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: usize,
    /// Server-side domain restriction; always populated from the allow-list.
    pub domain_allow_list: Vec<String>,
    pub search_depth: String,
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchResult>>;
    fn name(&self) -> &'static str;
}
