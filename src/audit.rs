// src/audit.rs
//! # Fact Verification Auditor
//!
//! For every cited claim: fetch the source, classify liveness, and check that the
//! page actually talks about what the notes say.
//!
//! Per claim:
//! 1. Empty page text ⇒ dead link: both flags false, claim dropped, one warning.
//! 2. Live page ⇒ keywords = notes without punctuation and stop words, length > 3.
//!    No keywords ⇒ verified (benefit of the doubt). Otherwise verified iff
//!    `matched / keywords >= threshold`, a keyword matching as a substring of the page.
//! 3. Unverified live claims are dropped with a warning carrying a notes prefix.
//!
//! Fetches run concurrently under the shared budget; evaluation is a pure function per
//! claim, applied in input order, so retained claims keep their relative order.

use futures::future::join_all;
use metrics::{counter, describe_counter};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::time::Instant;

use crate::config::AuditConfig;
use crate::fetch::PageFetcher;
use crate::model::{AuditedReport, EvidenceClaim};
use crate::pool::ConcurrencyBudget;
use crate::text::{anon_hash, truncate_chars};

static RE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("punct regex"));

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("audit_claims_total", "Claims evaluated by the auditor.");
        describe_counter!("audit_retained_total", "Claims kept after audit.");
        describe_counter!("audit_dead_links_total", "Claims dropped for an unreachable source.");
        describe_counter!(
            "audit_mismatch_total",
            "Claims dropped because the source text did not match the notes."
        );
    });
}

/// Keyword policy and thresholds.
#[derive(Debug, Clone)]
pub struct AuditPolicy {
    pub match_threshold: f32,
    pub min_keyword_len: usize,
    pub warning_notes_chars: usize,
    pub stop_words: HashSet<String>,
}

impl From<&AuditConfig> for AuditPolicy {
    fn from(c: &AuditConfig) -> Self {
        Self {
            match_threshold: c.match_threshold,
            min_keyword_len: c.min_keyword_len,
            warning_notes_chars: c.warning_notes_chars,
            stop_words: c.stop_words.iter().cloned().collect(),
        }
    }
}

impl Default for AuditPolicy {
    fn default() -> Self {
        Self::from(&AuditConfig::default())
    }
}

/// Significant words of `notes`, in order, duplicates kept.
pub fn extract_keywords(notes: &str, policy: &AuditPolicy) -> Vec<String> {
    let lowered = notes.to_lowercase();
    RE_PUNCT
        .replace_all(&lowered, "")
        .split_whitespace()
        .filter(|w| !policy.stop_words.contains(*w))
        .filter(|w| w.chars().count() >= policy.min_keyword_len)
        .map(str::to_string)
        .collect()
}

/// Share of keywords present in `page_text`; `None` when there are no keywords.
pub fn keyword_coverage(notes: &str, page_text: &str, policy: &AuditPolicy) -> Option<f32> {
    let keywords = extract_keywords(notes, policy);
    if keywords.is_empty() {
        return None;
    }
    let matched = keywords.iter().filter(|k| page_text.contains(k.as_str())).count();
    Some(matched as f32 / keywords.len() as f32)
}

/// Whether a live page supports the notes.
pub fn notes_supported(notes: &str, page_text: &str, policy: &AuditPolicy) -> bool {
    match keyword_coverage(notes, page_text, policy) {
        None => true,
        Some(ratio) => ratio >= policy.match_threshold,
    }
}

/// Result of auditing one claim.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Verified(EvidenceClaim),
    DeadLink { claim: EvidenceClaim, warning: String },
    Mismatch { claim: EvidenceClaim, warning: String },
}

impl ClaimOutcome {
    pub fn claim(&self) -> &EvidenceClaim {
        match self {
            ClaimOutcome::Verified(c) => c,
            ClaimOutcome::DeadLink { claim, .. } | ClaimOutcome::Mismatch { claim, .. } => claim,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            ClaimOutcome::Verified(_) => None,
            ClaimOutcome::DeadLink { warning, .. } | ClaimOutcome::Mismatch { warning, .. } => {
                Some(warning)
            }
        }
    }
}

pub fn dead_link_warning(url: &str) -> String {
    format!("dead link: {url}")
}

pub fn mismatch_warning(notes: &str, max_chars: usize) -> String {
    let prefix = truncate_chars(notes, max_chars);
    if prefix.chars().count() < notes.chars().count() {
        format!("source text did not match notes: {prefix}...")
    } else {
        format!("source text did not match notes: {prefix}")
    }
}

/// Claim in, claim out. Flags are always recomputed from `page_text`.
pub fn audit_claim(claim: EvidenceClaim, page_text: &str, policy: &AuditPolicy) -> ClaimOutcome {
    if page_text.is_empty() {
        let warning = dead_link_warning(claim.source_link.as_str());
        return ClaimOutcome::DeadLink {
            claim: claim.with_flags(false, false),
            warning,
        };
    }
    if notes_supported(&claim.notes, page_text, policy) {
        ClaimOutcome::Verified(claim.with_flags(true, true))
    } else {
        let warning = mismatch_warning(&claim.notes, policy.warning_notes_chars);
        ClaimOutcome::Mismatch {
            claim: claim.with_flags(true, false),
            warning,
        }
    }
}

/// Counts for one audit pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditSummary {
    pub checked: usize,
    pub retained: usize,
    pub dead: usize,
    pub mismatched: usize,
}

pub struct Auditor {
    fetcher: Arc<dyn PageFetcher>,
    budget: ConcurrencyBudget,
    policy: AuditPolicy,
}

impl Auditor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, budget: ConcurrencyBudget, policy: AuditPolicy) -> Self {
        ensure_metrics_described();
        Self {
            fetcher,
            budget,
            policy,
        }
    }

    pub fn policy(&self) -> &AuditPolicy {
        &self.policy
    }

    pub async fn audit(&self, report: AuditedReport) -> AuditedReport {
        self.audit_until(report, None).await.0
    }

    /// Audit every claim. Fetches still pending at `deadline` count as dead links.
    /// Warnings are appended to the existing list, never reset.
    pub async fn audit_until(
        &self,
        mut report: AuditedReport,
        deadline: Option<Instant>,
    ) -> (AuditedReport, AuditSummary) {
        let claims = std::mem::take(&mut report.evidence);
        let mut summary = AuditSummary {
            checked: claims.len(),
            ..AuditSummary::default()
        };
        if claims.is_empty() {
            return (report, summary);
        }
        tracing::info!(target: "audit", claims = claims.len(), "auditing sources");

        // One fetch per distinct URL within a pass.
        let mut urls: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for c in &claims {
            let u = c.source_link.as_str().to_string();
            if seen.insert(u.clone()) {
                urls.push(u);
            }
        }
        let texts = join_all(urls.iter().map(|u| self.fetch_bounded(u, deadline))).await;
        let pages: HashMap<String, String> = urls.into_iter().zip(texts).collect();

        let mut retained = Vec::with_capacity(claims.len());
        for claim in claims {
            let text = pages
                .get(claim.source_link.as_str())
                .map(String::as_str)
                .unwrap_or("");
            let id = anon_hash(&claim.notes);
            match audit_claim(claim, text, &self.policy) {
                ClaimOutcome::Verified(c) => {
                    summary.retained += 1;
                    retained.push(c);
                }
                ClaimOutcome::DeadLink { claim, warning } => {
                    summary.dead += 1;
                    tracing::warn!(target: "audit", %id, url = %claim.source_link, "dead link");
                    report.warnings.push(warning);
                }
                ClaimOutcome::Mismatch { claim, warning } => {
                    summary.mismatched += 1;
                    tracing::warn!(target: "audit", %id, url = %claim.source_link, "content mismatch");
                    report.warnings.push(warning);
                }
            }
        }
        report.evidence = retained;

        counter!("audit_claims_total").increment(summary.checked as u64);
        counter!("audit_retained_total").increment(summary.retained as u64);
        counter!("audit_dead_links_total").increment(summary.dead as u64);
        counter!("audit_mismatch_total").increment(summary.mismatched as u64);
        tracing::info!(
            target: "audit",
            checked = summary.checked,
            retained = summary.retained,
            dead = summary.dead,
            mismatched = summary.mismatched,
            "audit done"
        );
        (report, summary)
    }

    async fn fetch_bounded(&self, url: &str, deadline: Option<Instant>) -> String {
        let fut = async {
            match self.budget.acquire().await {
                Ok(_permit) => self.fetcher.fetch(url).await,
                Err(e) => {
                    tracing::warn!(target: "audit", error = %e, url, "no fetch slot");
                    String::new()
                }
            }
        };
        match deadline {
            Some(d) => tokio::time::timeout_at(d, fut).await.unwrap_or_default(),
            None => fut.await,
        }
    }
}
