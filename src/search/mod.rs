// src/search/mod.rs
//! Batch search: cap → augment → dedupe → cached, concurrency-bounded dispatch → rank →
//! flatten → dedupe by URL.
pub mod cache;
pub mod providers;
pub mod types;

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;

use crate::config::{EngineConfig, SearchConfig};
use crate::model::SearchResult;
use crate::pool::ConcurrencyBudget;
use crate::rank::rank;
use crate::search::cache::QueryCache;
use crate::search::types::{SearchProvider, SearchRequest};
use crate::text::normalize_query;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "search_queries_dispatched_total",
            "Queries sent to the search provider."
        );
        describe_counter!(
            "search_cache_hits_total",
            "Queries answered from the query cache."
        );
        describe_counter!(
            "search_provider_errors_total",
            "Provider errors and timeouts (degraded to empty results)."
        );
        describe_counter!(
            "search_results_total",
            "Unique results returned by search() calls."
        );
        describe_histogram!("search_provider_ms", "Provider round-trip time in milliseconds.");
    });
}

/// Dispatches query batches to one provider under a shared concurrency budget.
pub struct SearchOrchestrator {
    provider: Arc<dyn SearchProvider>,
    cfg: SearchConfig,
    allow_list: Arc<Vec<String>>,
    budget: ConcurrencyBudget,
    cache: QueryCache,
}

impl SearchOrchestrator {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        cfg: &EngineConfig,
        budget: ConcurrencyBudget,
    ) -> Self {
        ensure_metrics_described();
        Self {
            provider,
            cfg: cfg.search.clone(),
            allow_list: Arc::new(cfg.allow_list.clone()),
            budget,
            cache: QueryCache::new(),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn budget(&self) -> &ConcurrencyBudget {
        &self.budget
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Cap to `max_queries`, drop blanks, append the suffix, dedupe by normalized form.
    /// The first occurrence keeps its casing and position.
    pub fn prepare_queries<S: AsRef<str>>(&self, queries: &[S]) -> Vec<String> {
        let suffix = self.cfg.query_suffix.as_str();
        let suffix_norm = normalize_query(suffix);
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for q in queries.iter().take(self.cfg.max_queries) {
            let q = q.as_ref().trim();
            if q.is_empty() {
                continue;
            }
            let augmented = if suffix_norm.is_empty() || normalize_query(q).ends_with(&suffix_norm) {
                q.to_string()
            } else {
                format!("{q}{suffix}")
            };
            if seen.insert(normalize_query(&augmented)) {
                out.push(augmented);
            }
        }
        out
    }

    /// Search without a caller deadline.
    pub async fn search<S: AsRef<str>>(&self, queries: &[S]) -> Vec<SearchResult> {
        self.search_until(queries, None).await
    }

    /// Results unique by URL, ordered by first appearance across queries in submission
    /// order. Queries still pending at `deadline` count as failed (empty).
    pub async fn search_until<S: AsRef<str>>(
        &self,
        queries: &[S],
        deadline: Option<Instant>,
    ) -> Vec<SearchResult> {
        let prepared = self.prepare_queries(queries);
        if prepared.is_empty() {
            return Vec::new();
        }
        tracing::info!(target: "search", queries = ?prepared, provider = self.provider.name(), "batch search");

        let per_query = join_all(prepared.iter().map(|q| self.search_one(q, deadline))).await;

        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut out = Vec::new();
        for batch in per_query {
            for item in batch.iter() {
                if item.url.is_empty() {
                    continue;
                }
                if seen_urls.insert(item.url.clone()) {
                    out.push(item.clone());
                }
            }
        }

        counter!("search_results_total").increment(out.len() as u64);
        tracing::info!(target: "search", unique = out.len(), "batch search done");
        out
    }

    /// One augmented query: cache hit, or a bounded + timed dispatch and rank.
    async fn search_one(&self, query: &str, deadline: Option<Instant>) -> Arc<Vec<SearchResult>> {
        if let Some(hit) = self.cache.get(query) {
            counter!("search_cache_hits_total").increment(1);
            tracing::debug!(target: "search", query, "cache hit");
            return hit;
        }

        let fut = self.dispatch(query);
        let outcome = match deadline {
            Some(d) => match tokio::time::timeout_at(d, fut).await {
                Ok(r) => r,
                Err(_) => Err(anyhow::anyhow!("deadline reached")),
            },
            None => fut.await,
        };

        match outcome {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(target: "search", error = %e, query, "search failed; using empty result");
                counter!("search_provider_errors_total").increment(1);
                Arc::new(Vec::new())
            }
        }
    }

    async fn dispatch(&self, query: &str) -> anyhow::Result<Arc<Vec<SearchResult>>> {
        let _permit = self.budget.acquire().await?;

        // Another task may have filled the entry while this one waited for a slot.
        if let Some(hit) = self.cache.peek(query) {
            counter!("search_cache_hits_total").increment(1);
            return Ok(hit);
        }

        let req = SearchRequest {
            query: query.to_string(),
            max_results: self.cfg.max_results,
            domain_allow_list: self.allow_list.as_ref().clone(),
            search_depth: self.cfg.search_depth.clone(),
        };
        counter!("search_queries_dispatched_total").increment(1);

        let raw = tokio::time::timeout(self.cfg.timeout(), self.provider.search(&req))
            .await
            .map_err(|_| anyhow::anyhow!("provider timeout after {}s", self.cfg.timeout_secs))??;

        let ranked = rank(query, &raw, self.cfg.top_k);
        Ok(self.cache.insert(query, ranked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::providers::mock::MockSearchProvider;

    fn orch(provider: MockSearchProvider) -> (SearchOrchestrator, Arc<MockSearchProvider>) {
        let p = Arc::new(provider);
        let cfg = EngineConfig::with_builtin_allow_list();
        let o = SearchOrchestrator::new(p.clone(), &cfg, ConcurrencyBudget::new(20));
        (o, p)
    }

    #[test]
    fn prepare_caps_augments_and_dedupes() {
        let (o, _) = orch(MockSearchProvider::new());
        let q = o.prepare_queries(&["Sodium", " sodium ", "", "potassium", "fiber"]);
        // cap 3 applies first: ["Sodium", " sodium ", ""] → one survivor.
        assert_eq!(q, vec!["Sodium clinical data".to_string()]);

        let q2 = o.prepare_queries(&["Salt clinical data", "Sugar"]);
        assert_eq!(
            q2,
            vec!["Salt clinical data".to_string(), "Sugar clinical data".to_string()]
        );
    }

    #[tokio::test]
    async fn failed_query_degrades_to_empty() {
        let (o, p) = orch(
            MockSearchProvider::new()
                .with_response("a clinical data", vec![SearchResult::new("https://who.int/a", "", "a")])
                .failing_on("b clinical data"),
        );
        let out = o.search(&["a", "b"]).await;
        assert_eq!(out.len(), 1);
        assert_eq!(p.call_count(), 2);
        // failures are not cached
        assert!(o.cache().peek("b clinical data").is_none());
    }
}
