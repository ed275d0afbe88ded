// src/search/cache.rs
//! Query → ranked results cache. Entries never expire; the cache lives as long as the
//! orchestrator that owns it.
//!
//! Read-and-insert only: an existing entry is never replaced, so concurrent inserts for
//! the same key resolve to whichever landed first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::model::SearchResult;
use crate::text::normalize_query;

#[derive(Debug, Default)]
pub struct QueryCache {
    inner: RwLock<HashMap<String, Arc<Vec<SearchResult>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup by normalized query; counts hits and misses.
    pub fn get(&self, query: &str) -> Option<Arc<Vec<SearchResult>>> {
        let key = normalize_query(query);
        let found = self
            .inner
            .read()
            .ok()
            .and_then(|m| m.get(&key).cloned());
        match found {
            Some(v) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(v)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Lookup without touching the counters.
    pub fn peek(&self, query: &str) -> Option<Arc<Vec<SearchResult>>> {
        let key = normalize_query(query);
        self.inner.read().ok().and_then(|m| m.get(&key).cloned())
    }

    /// Insert unless present; returns the value now stored under the key.
    pub fn insert(&self, query: &str, results: Vec<SearchResult>) -> Arc<Vec<SearchResult>> {
        let key = normalize_query(query);
        let fresh = Arc::new(results);
        match self.inner.write() {
            Ok(mut m) => m.entry(key).or_insert(fresh).clone(),
            // A poisoned lock only loses caching, not the results.
            Err(_) => fresh,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.inner.write() {
            m.clear();
        }
    }
}
