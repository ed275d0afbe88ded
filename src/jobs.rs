// src/jobs.rs
//! Job-level wrapper around the pipeline: one item in, a structured outcome out.
//!
//! Failures are recorded in the store and returned as data so a queue layer can decide on
//! retries; nothing here panics or propagates the pipeline error.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::pipeline::Pipeline;
use crate::store::{FailureRecord, ReportStore};
use crate::text::truncate_chars;

const SNIPPET_CHARS: usize = 200;

/// Ingredient entry: either a bare string or `{ "item": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Ingredient {
    Plain(String),
    Item { item: String },
}

impl Ingredient {
    pub fn name(&self) -> &str {
        match self {
            Ingredient::Plain(s) => s,
            Ingredient::Item { item } => item,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FoodItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
}

impl FoodItem {
    pub fn to_prompt_text(&self) -> String {
        let title = if self.title.trim().is_empty() {
            "Unknown Title"
        } else {
            self.title.trim()
        };
        let mut out = format!("Title: {title}\nDescription: {}\nIngredients:", self.description.trim());
        for ing in &self.ingredients {
            out.push_str("\n- ");
            out.push_str(ing.name().trim());
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Success {
        item_id: String,
        health_score: u8,
        evidence: usize,
        warnings: usize,
    },
    Failed {
        item_id: String,
        kind: String,
        reason: String,
        retryable: bool,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }
}

/// Analyze one item and persist the result or a failure record.
pub async fn process_job(
    pipeline: &Pipeline,
    store: &dyn ReportStore,
    item: &FoodItem,
    attempt: u32,
) -> JobOutcome {
    let text = item.to_prompt_text();
    tracing::info!(target: "jobs", item_id = %item.id, attempt, "processing item");

    let (kind, reason, retryable) = match pipeline.analyze(&text, None).await {
        Ok(report) => match store.save_report(&item.id, &report).await {
            Ok(()) => {
                tracing::info!(target: "jobs", item_id = %item.id, health_score = report.health_score, "report saved");
                return JobOutcome::Success {
                    item_id: item.id.clone(),
                    health_score: report.health_score,
                    evidence: report.evidence.len(),
                    warnings: report.warnings.len(),
                };
            }
            Err(e) => ("store".to_string(), format!("saving report failed: {e:#}"), true),
        },
        Err(e) => (e.kind().to_string(), e.reason(), e.is_retryable()),
    };

    tracing::warn!(target: "jobs", item_id = %item.id, %kind, %reason, "job failed");
    let record = FailureRecord {
        item_id: item.id.clone(),
        title: item.title.clone(),
        text_snippet: truncate_chars(&text, SNIPPET_CHARS),
        error: reason.clone(),
        kind: kind.clone(),
        attempt,
        failed_at: Utc::now(),
    };
    if let Err(e) = store.record_failure(record).await {
        tracing::warn!(target: "jobs", item_id = %item.id, error = ?e, "could not record failure");
    }
    JobOutcome::Failed {
        item_id: item.id.clone(),
        kind,
        reason,
        retryable,
    }
}

/// Items that have no stored report yet, in input order.
pub async fn pending_items<'a>(
    store: &dyn ReportStore,
    items: &'a [FoodItem],
) -> anyhow::Result<Vec<&'a FoodItem>> {
    let mut out = Vec::new();
    for it in items {
        if !store.has_report(&it.id).await? {
            out.push(it);
        }
    }
    Ok(out)
}

/// Process every pending item sequentially.
pub async fn process_pending(
    pipeline: &Pipeline,
    store: &dyn ReportStore,
    items: &[FoodItem],
) -> anyhow::Result<Vec<JobOutcome>> {
    let pending = pending_items(store, items).await?;
    tracing::info!(target: "jobs", total = items.len(), pending = pending.len(), "batch start");
    let mut out = Vec::with_capacity(pending.len());
    for item in pending {
        out.push(process_job(pipeline, store, item, 1).await);
    }
    Ok(out)
}
