// src/store.rs
//! Persistence seam for audited reports and failure records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::AuditedReport;

/// A saved report with its item id and save time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredReport {
    pub item_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: AuditedReport,
}

/// What gets written when an item could not be analyzed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureRecord {
    pub item_id: String,
    pub title: String,
    /// First 200 chars of the prompt text.
    pub text_snippet: String,
    pub error: String,
    pub kind: String,
    pub attempt: u32,
    pub failed_at: DateTime<Utc>,
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save_report(&self, item_id: &str, report: &AuditedReport) -> anyhow::Result<()>;
    async fn load_report(&self, item_id: &str) -> anyhow::Result<Option<StoredReport>>;
    async fn has_report(&self, item_id: &str) -> anyhow::Result<bool>;
    async fn record_failure(&self, record: FailureRecord) -> anyhow::Result<()>;
    async fn failures(&self) -> anyhow::Result<Vec<FailureRecord>>;
}

/// In-process store. Saving again under the same id replaces the report.
#[derive(Default)]
pub struct MemoryStore {
    reports: Mutex<HashMap<String, StoredReport>>,
    failures: Mutex<Vec<FailureRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow::anyhow!("memory store lock poisoned")
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn save_report(&self, item_id: &str, report: &AuditedReport) -> anyhow::Result<()> {
        let stored = StoredReport {
            item_id: item_id.to_string(),
            created_at: Utc::now(),
            report: report.clone(),
        };
        self.reports
            .lock()
            .map_err(poisoned)?
            .insert(item_id.to_string(), stored);
        Ok(())
    }

    async fn load_report(&self, item_id: &str) -> anyhow::Result<Option<StoredReport>> {
        Ok(self.reports.lock().map_err(poisoned)?.get(item_id).cloned())
    }

    async fn has_report(&self, item_id: &str) -> anyhow::Result<bool> {
        Ok(self.reports.lock().map_err(poisoned)?.contains_key(item_id))
    }

    async fn record_failure(&self, record: FailureRecord) -> anyhow::Result<()> {
        self.failures.lock().map_err(poisoned)?.push(record);
        Ok(())
    }

    async fn failures(&self) -> anyhow::Result<Vec<FailureRecord>> {
        Ok(self.failures.lock().map_err(poisoned)?.clone())
    }
}
