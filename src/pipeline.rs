// src/pipeline.rs
//! generation → extraction → schema validation → audit.
//!
//! Every `analyze` call opens a [`Session`] that owns the transient resources of the run
//! (page fetcher client, search orchestrator with its query cache). The session is a drop
//! guard, so resources are released on success, error and timeout alike.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::audit::{AuditPolicy, Auditor};
use crate::config::{EngineConfig, FetchConfig};
use crate::error::PipelineError;
use crate::extract::extract_report;
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::generate::{prompt, DynGenerator, GenerationRequest};
use crate::model::{AuditedReport, UserProfile};
use crate::pool::ConcurrencyBudget;
use crate::profiles::resolve_profiles;
use crate::search::types::SearchProvider;
use crate::search::SearchOrchestrator;
use crate::text::anon_hash;

/// Slack after the deadline so degraded search/audit results can still be assembled.
const SETTLE_GRACE: Duration = Duration::from_millis(250);

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "analyze() invocations.");
        describe_counter!("pipeline_failures_total", "analyze() invocations that failed, by kind.");
        describe_gauge!("pipeline_sessions_open", "Sessions currently holding transient resources.");
    });
}

/// Hands out a page fetcher for one session.
pub trait FetcherSource: Send + Sync {
    fn open(&self) -> anyhow::Result<Arc<dyn PageFetcher>>;
}

/// Builds a fresh HTTP client per session.
pub struct HttpFetcherSource {
    cfg: FetchConfig,
}

impl HttpFetcherSource {
    pub fn new(cfg: FetchConfig) -> Self {
        Self { cfg }
    }
}

impl FetcherSource for HttpFetcherSource {
    fn open(&self) -> anyhow::Result<Arc<dyn PageFetcher>> {
        Ok(Arc::new(HttpFetcher::new(&self.cfg)?))
    }
}

/// Shares one fetcher across sessions (tests, in-memory fetchers).
pub struct SharedFetcher(pub Arc<dyn PageFetcher>);

impl FetcherSource for SharedFetcher {
    fn open(&self) -> anyhow::Result<Arc<dyn PageFetcher>> {
        Ok(self.0.clone())
    }
}

/// Resources held for one `analyze` run.
pub struct Session {
    pub search: SearchOrchestrator,
    pub auditor: Auditor,
    open: Arc<AtomicUsize>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        gauge!("pipeline_sessions_open").decrement(1.0);
        tracing::debug!(target: "pipeline", "session released");
    }
}

pub struct Pipeline {
    cfg: EngineConfig,
    provider: Arc<dyn SearchProvider>,
    generator: DynGenerator,
    fetchers: Arc<dyn FetcherSource>,
    search_budget: ConcurrencyBudget,
    fetch_budget: ConcurrencyBudget,
    open_sessions: Arc<AtomicUsize>,
}

impl Pipeline {
    pub fn new(
        cfg: EngineConfig,
        provider: Arc<dyn SearchProvider>,
        generator: DynGenerator,
        fetchers: Arc<dyn FetcherSource>,
    ) -> Self {
        ensure_metrics_described();
        let search_budget = ConcurrencyBudget::new(cfg.search.max_concurrency);
        let fetch_budget = match cfg.fetch.max_concurrency {
            Some(n) => ConcurrencyBudget::new(n),
            None => search_budget.clone(),
        };
        Self {
            cfg,
            provider,
            generator,
            fetchers,
            search_budget,
            fetch_budget,
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn budget(&self) -> &ConcurrencyBudget {
        &self.search_budget
    }

    pub fn generator_name(&self) -> &'static str {
        self.generator.provider_name()
    }

    /// Sessions alive right now; zero whenever no `analyze` call is running.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// A standalone orchestrator on the shared budget, with its own cache.
    pub fn orchestrator(&self) -> SearchOrchestrator {
        SearchOrchestrator::new(self.provider.clone(), &self.cfg, self.search_budget.clone())
    }

    pub fn open_session(&self) -> Result<Session, PipelineError> {
        let fetcher = self.fetchers.open()?;
        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        gauge!("pipeline_sessions_open").increment(1.0);
        Ok(Session {
            search: self.orchestrator(),
            auditor: Auditor::new(
                fetcher,
                self.fetch_budget.clone(),
                AuditPolicy::from(&self.cfg.audit),
            ),
            open: self.open_sessions.clone(),
        })
    }

    /// Audited report for `text`, assessed against `profiles` (defaults when `None`).
    pub async fn analyze(
        &self,
        text: &str,
        profiles: Option<Vec<UserProfile>>,
    ) -> Result<AuditedReport, PipelineError> {
        counter!("pipeline_runs_total").increment(1);
        let res = self.analyze_inner(text, profiles).await;
        if let Err(e) = &res {
            counter!("pipeline_failures_total", "kind" => e.kind()).increment(1);
            tracing::warn!(target: "pipeline", item = %anon_hash(text), kind = e.kind(), reason = %e.reason(), "analysis failed");
        }
        res
    }

    async fn analyze_inner(
        &self,
        text: &str,
        profiles: Option<Vec<UserProfile>>,
    ) -> Result<AuditedReport, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::input("item text is empty"));
        }
        let profiles = resolve_profiles(profiles)?;
        let deadline = Instant::now() + self.cfg.pipeline.deadline();

        let session = self.open_session()?;
        tracing::info!(
            target: "pipeline",
            item = %anon_hash(text),
            profiles = profiles.len(),
            generator = self.generator.provider_name(),
            "analysis started"
        );

        let run = self.run(&session, text, profiles, deadline);
        match tokio::time::timeout_at(deadline + SETTLE_GRACE, run).await {
            Ok(res) => res,
            Err(_) => Err(PipelineError::Timeout {
                secs: self.cfg.pipeline.deadline_secs,
            }),
        }
    }

    async fn run(
        &self,
        session: &Session,
        text: &str,
        profiles: Vec<UserProfile>,
        deadline: Instant,
    ) -> Result<AuditedReport, PipelineError> {
        let prefetch = self.cfg.pipeline.search_before_generation;
        let context = if prefetch {
            let seeds = seed_queries(text);
            session.search.search_until(seeds.as_slice(), Some(deadline)).await
        } else {
            Vec::new()
        };

        let req = GenerationRequest {
            system_prompt: prompt::system_prompt(&profiles, !prefetch),
            user_message: prompt::user_message(text, &context),
        };
        let tool = (!prefetch).then_some(&session.search);

        let raw = tokio::time::timeout_at(deadline, self.generator.generate(&req, tool))
            .await
            .map_err(|_| PipelineError::Timeout {
                secs: self.cfg.pipeline.deadline_secs,
            })??;
        let raw = match raw {
            Some(r) if !r.trim().is_empty() => r,
            _ => return Err(PipelineError::GenerationEmpty),
        };

        let mut report = extract_report(&raw)?;
        report.user_details = profiles;

        let (report, summary) = session.auditor.audit_until(report, Some(deadline)).await;
        tracing::info!(
            target: "pipeline",
            health_score = report.health_score,
            retained = summary.retained,
            dropped = summary.dead + summary.mismatched,
            "analysis complete"
        );
        Ok(report)
    }
}

/// Query used for pre-generation search: the first non-blank line, minus a `Title:` label.
pub fn seed_queries(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(|l| l.strip_prefix("Title:").unwrap_or(l).trim().to_string())
        .filter(|l| !l.is_empty())
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;
    use crate::generate::ScriptedGenerator;
    use crate::search::providers::mock::MockSearchProvider;

    fn pipeline(generator: ScriptedGenerator) -> Pipeline {
        Pipeline::new(
            EngineConfig::with_builtin_allow_list(),
            Arc::new(MockSearchProvider::new()),
            Arc::new(generator),
            Arc::new(SharedFetcher(Arc::new(StaticFetcher::new()))),
        )
    }

    #[test]
    fn seed_query_is_first_line() {
        assert_eq!(seed_queries("\n  Title: Lentil Soup\nDescription: x"), vec!["Lentil Soup"]);
        assert!(seed_queries("   \n").is_empty());
    }

    #[tokio::test]
    async fn empty_generation_is_generation_empty_and_releases_session() {
        let p = pipeline(ScriptedGenerator::empty());
        let err = p.analyze("Title: Soup", None).await.unwrap_err();
        assert!(matches!(err, PipelineError::GenerationEmpty));
        assert_eq!(p.open_sessions(), 0);
    }

    #[tokio::test]
    async fn blank_text_is_invalid_input() {
        let p = pipeline(ScriptedGenerator::new("{}"));
        let err = p.analyze("   ", None).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[tokio::test]
    async fn transport_failure_is_setup() {
        let p = pipeline(ScriptedGenerator::failing("connection refused"));
        let err = p.analyze("Title: Soup", None).await.unwrap_err();
        assert_eq!(err.kind(), "setup");
        assert!(err.reason().contains("connection refused"));
        assert_eq!(p.open_sessions(), 0);
    }
}
