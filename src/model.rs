// src/model.rs
//! Core records: search results, evidence claims, user profiles, and the audited report.

use serde::{Deserialize, Serialize};
use url::Url;

/// One document returned by the search provider. Uniqueness key = `url`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl SearchResult {
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
        }
    }

    /// Host part of `url`, lower-cased, if it parses.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }
}

/// A cited claim as emitted by the generator, before any audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimDraft {
    pub notes: String,
    pub source_link: Url,
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default)]
    pub relevant_scenarios: Vec<String>,
}

/// A cited claim with audit flags.
///
/// `link_status` and `link_contains_notes_in_content` are derived by the auditor on
/// every pass and are never taken from upstream input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvidenceClaim {
    pub notes: String,
    pub source_link: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote: Option<String>,
    #[serde(default)]
    pub relevant_scenarios: Vec<String>,
    #[serde(default)]
    pub link_status: bool,
    #[serde(default)]
    pub link_contains_notes_in_content: bool,
}

impl From<ClaimDraft> for EvidenceClaim {
    fn from(d: ClaimDraft) -> Self {
        Self {
            notes: d.notes,
            source_link: d.source_link,
            quote: d.quote,
            relevant_scenarios: d.relevant_scenarios,
            link_status: false,
            link_contains_notes_in_content: false,
        }
    }
}

impl EvidenceClaim {
    /// Unaudited claim (both flags false).
    pub fn unaudited(notes: impl Into<String>, source_link: Url) -> Self {
        Self {
            notes: notes.into(),
            source_link,
            quote: None,
            relevant_scenarios: Vec::new(),
            link_status: false,
            link_contains_notes_in_content: false,
        }
    }

    /// Claim with both flags replaced, everything else carried over.
    pub fn with_flags(self, link_status: bool, contains_notes: bool) -> Self {
        Self {
            link_status,
            link_contains_notes_in_content: contains_notes,
            ..self
        }
    }

    pub fn is_verified(&self) -> bool {
        self.link_status && self.link_contains_notes_in_content
    }
}

/// Per-profile verdict produced by the generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scenario {
    pub scenario: String,
    #[serde(default)]
    pub verdict: String,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Lifestyle {
    Sedentary,
    Active,
    VeryActive,
}

impl Lifestyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifestyle::Sedentary => "sedentary",
            Lifestyle::Active => "active",
            Lifestyle::VeryActive => "very_active",
        }
    }
}

/// A person the item is assessed for. `label` is unique within one report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub label: String,
    pub age: u32,
    /// Kilograms.
    pub weight: f32,
    /// Centimetres.
    pub height: f32,
    pub lifestyle: Lifestyle,
    #[serde(default)]
    pub conditions: Vec<String>,
}

/// Terminal artifact of one pipeline run.
///
/// After an audit pass every element of `evidence` is verified (live link, matching content).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditedReport {
    pub health_score: u8,
    pub scientific_summary: String,
    #[serde(alias = "user_scenario")]
    pub user_scenarios: Vec<Scenario>,
    #[serde(default)]
    pub evidence: Vec<EvidenceClaim>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub user_details: Vec<UserProfile>,
}

impl AuditedReport {
    /// True iff every retained claim carries both audit flags.
    pub fn all_evidence_verified(&self) -> bool {
        self.evidence.iter().all(EvidenceClaim::is_verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn draft_conversion_resets_flags() {
        let d = ClaimDraft {
            notes: "n".into(),
            source_link: url("https://www.cdc.gov/salt"),
            quote: Some("q".into()),
            relevant_scenarios: vec!["A".into()],
        };
        let c: EvidenceClaim = d.into();
        assert!(!c.link_status);
        assert!(!c.link_contains_notes_in_content);
        assert_eq!(c.quote.as_deref(), Some("q"));
    }

    #[test]
    fn upstream_flags_are_ignored_when_parsing_drafts() {
        let raw = r#"{"notes":"x","source_link":"https://who.int/a","link_status":true,
                      "link_contains_notes_in_content":true}"#;
        let d: ClaimDraft = serde_json::from_str(raw).unwrap();
        let c = EvidenceClaim::from(d);
        assert!(!c.is_verified());
    }

    #[test]
    fn report_accepts_user_scenario_alias() {
        let raw = r#"{"health_score": 40, "scientific_summary": "s",
                      "user_scenario": [{"scenario": "A", "verdict": "AVOID", "reasoning": "r"}]}"#;
        let r: AuditedReport = serde_json::from_str(raw).unwrap();
        assert_eq!(r.user_scenarios.len(), 1);
        assert!(r.evidence.is_empty());
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn host_is_lowercased() {
        let r = SearchResult::new("https://WWW.NCBI.nlm.nih.gov/pmc/1", "t", "c");
        assert_eq!(r.host().as_deref(), Some("www.ncbi.nlm.nih.gov"));
        assert_eq!(SearchResult::new("not a url", "", "").host(), None);
    }

    #[test]
    fn lifestyle_serializes_snake_case() {
        let s = serde_json::to_string(&Lifestyle::VeryActive).unwrap();
        assert_eq!(s, "\"very_active\"");
    }
}
