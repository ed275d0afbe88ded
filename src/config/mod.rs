// src/config/mod.rs
//! Engine configuration loaded from TOML, with env overrides.
//!
//! Resolution: `$ENGINE_CONFIG_PATH` → `config/engine.toml` → built-in defaults.
//! Every field has a default, so a partial file is fine.

pub mod ai;
pub mod allow_list;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENGINE_CONFIG_PATH: &str = "config/engine.toml";
pub const ENV_ENGINE_CONFIG_PATH: &str = "ENGINE_CONFIG_PATH";
pub const ENV_SEARCH_MAX_CONCURRENCY: &str = "SEARCH_MAX_CONCURRENCY";
pub const ENV_AUDIT_MATCH_THRESHOLD: &str = "AUDIT_MATCH_THRESHOLD";

pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "and", "a", "an", "of", "in", "to", "for", "with", "are",
    "be", "that", "this", "it",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Filled from the allow-list file, not from engine.toml.
    #[serde(skip)]
    pub allow_list: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
    #[serde(default = "default_query_suffix")]
    pub query_suffix: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_search_depth")]
    pub search_depth: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_queries() -> usize {
    3
}
fn default_query_suffix() -> String {
    " clinical data".to_string()
}
fn default_max_results() -> usize {
    5
}
fn default_top_k() -> usize {
    crate::rank::DEFAULT_TOP_K
}
fn default_max_concurrency() -> usize {
    crate::pool::DEFAULT_MAX_CONCURRENCY
}
fn default_search_depth() -> String {
    "advanced".to_string()
}
fn default_search_timeout_secs() -> u64 {
    20
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_queries: default_max_queries(),
            query_suffix: default_query_suffix(),
            max_results: default_max_results(),
            top_k: default_top_k(),
            max_concurrency: default_max_concurrency(),
            search_depth: default_search_depth(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Separate cap for audit fetches; `None` shares the search budget.
    #[serde(default)]
    pub max_concurrency: Option<usize>,
}

fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
            max_concurrency: None,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,
    /// Keywords shorter than this are ignored ("longer than 3" ⇒ 4).
    #[serde(default = "default_min_keyword_len")]
    pub min_keyword_len: usize,
    #[serde(default = "default_warning_notes_chars")]
    pub warning_notes_chars: usize,
    #[serde(default = "default_stop_words")]
    pub stop_words: Vec<String>,
}

fn default_match_threshold() -> f32 {
    0.5
}
fn default_min_keyword_len() -> usize {
    4
}
fn default_warning_notes_chars() -> usize {
    30
}
fn default_stop_words() -> Vec<String> {
    DEFAULT_STOP_WORDS.iter().map(|s| s.to_string()).collect()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            min_keyword_len: default_min_keyword_len(),
            warning_notes_chars: default_warning_notes_chars(),
            stop_words: default_stop_words(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Run the generator with search results pre-fetched instead of as a tool.
    #[serde(default)]
    pub search_before_generation: bool,
}

fn default_deadline_secs() -> u64 {
    180
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            search_before_generation: false,
        }
    }
}

impl PipelineConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs.max(1))
    }
}

impl EngineConfig {
    /// Load engine.toml (path from env or default) plus the allow-list, then apply env overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(ENV_ENGINE_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_ENGINE_CONFIG_PATH));

        let mut cfg = if path.exists() {
            Self::from_path(&path)?
        } else if std::env::var(ENV_ENGINE_CONFIG_PATH).is_ok() {
            return Err(anyhow!(
                "{ENV_ENGINE_CONFIG_PATH} points to non-existent path {}",
                path.display()
            ));
        } else {
            Self::default()
        };

        cfg.allow_list = allow_list::load_allow_list_default()?;
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing engine config {}", path.display()))
    }

    /// Parse TOML; the allow-list falls back to the built-in academic set.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: EngineConfig = toml::from_str(s)?;
        cfg.allow_list = allow_list::builtin_allow_list();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Defaults with the built-in allow-list (handy for tests and the binary fallback).
    pub fn with_builtin_allow_list() -> Self {
        Self {
            allow_list: allow_list::builtin_allow_list(),
            ..Self::default()
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(n) = parse_usize_env(std::env::var(ENV_SEARCH_MAX_CONCURRENCY).ok()) {
            self.search.max_concurrency = n;
        }
        if let Some(t) = parse_threshold_env(std::env::var(ENV_AUDIT_MATCH_THRESHOLD).ok()) {
            self.audit.match_threshold = t;
        }
    }

    fn sanitize(&mut self) {
        self.search.max_queries = self.search.max_queries.max(1);
        self.search.max_concurrency = self.search.max_concurrency.max(1);
        self.search.top_k = self.search.top_k.max(1);
        self.fetch.max_concurrency = self.fetch.max_concurrency.map(|n| n.max(1));
        if !self.audit.match_threshold.is_finite() {
            self.audit.match_threshold = default_match_threshold();
        }
        self.audit.match_threshold = self.audit.match_threshold.clamp(0.0, 1.0);
        self.audit.stop_words = self
            .audit
            .stop_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
    }
}

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

fn parse_usize_env(raw: Option<String>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .map(|v| v.clamp(1, 512))
}
