// src/extract.rs
//! Recover the report object from free-form model output.
//!
//! Candidates come from several strategies. Each strategy yields every JSON object it can
//! parse. All candidates are ordered by position in the text and scanned from the back;
//! the first object carrying all of [`REQUIRED_KEYS`] wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::model::{AuditedReport, ClaimDraft, EvidenceClaim, Scenario};
use crate::text::anon_hash;

pub const REQUIRED_KEYS: &[&str] = &["health_score", "scientific_summary", "user_scenario"];

pub const NO_REPORT_REASON: &str = "model returned text but no valid JSON report object";
pub const TOOL_ARGS_REASON: &str =
    "model emitted tool arguments instead of calling the tool (try running again)";

static RE_LAZY_OBJ: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*?\}").expect("lazy object regex"));
static RE_GREEDY_OBJ: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("greedy object regex"));

/// A parsed object and the byte span it was parsed from.
struct Candidate {
    span: (usize, usize),
    obj: Map<String, Value>,
}

type Strategy = fn(&str) -> Vec<Candidate>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("non_greedy", non_greedy_candidates),
    ("balanced", balanced_candidates),
    ("greedy", greedy_candidate),
];

fn parse_object(s: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(s) {
        Ok(Value::Object(m)) => Some(m),
        _ => None,
    }
}

fn candidate_at(text: &str, start: usize, end: usize) -> Option<Candidate> {
    parse_object(&text[start..end]).map(|obj| Candidate {
        span: (start, end),
        obj,
    })
}

/// Every shortest `{...}` span that parses on its own.
fn non_greedy_candidates(text: &str) -> Vec<Candidate> {
    RE_LAZY_OBJ
        .find_iter(text)
        .filter_map(|m| candidate_at(text, m.start(), m.end()))
        .collect()
}

/// Top-level brace-balanced spans. Braces inside JSON strings are not counted.
fn balanced_candidates(text: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_str = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if depth > 0 && in_str {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_str = false;
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_str = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    out.extend(candidate_at(text, start, i + 1));
                }
            }
            _ => {}
        }
    }
    out
}

/// First `{` to last `}` in one piece.
fn greedy_candidate(text: &str) -> Vec<Candidate> {
    RE_GREEDY_OBJ
        .find(text)
        .and_then(|m| candidate_at(text, m.start(), m.end()))
        .into_iter()
        .collect()
}

fn has_required_keys(obj: &Map<String, Value>) -> bool {
    REQUIRED_KEYS.iter().all(|k| obj.contains_key(*k))
}

/// The last qualifying JSON object in `text`, or `None`.
///
/// Candidates from all strategies are ordered by where they start in `text`
/// (then by end); identical spans count once. "Last" is positional.
pub fn extract(text: &str) -> Option<Map<String, Value>> {
    let mut candidates = Vec::new();
    for (name, strategy) in STRATEGIES {
        let found = strategy(text);
        tracing::debug!(target: "extract", strategy = name, candidates = found.len());
        candidates.extend(found);
    }
    candidates.sort_by_key(|c| c.span);
    candidates.dedup_by_key(|c| c.span);
    candidates
        .into_iter()
        .rev()
        .map(|c| c.obj)
        .find(has_required_keys)
}

#[derive(Debug, Deserialize)]
struct ReportDraft {
    health_score: i64,
    scientific_summary: String,
    user_scenario: Vec<Scenario>,
    #[serde(default)]
    evidence: Vec<ClaimDraft>,
}

/// Type-check an extracted object into an unaudited report.
pub fn validate_report(obj: Map<String, Value>) -> Result<AuditedReport, PipelineError> {
    let draft: ReportDraft = serde_json::from_value(Value::Object(obj))
        .map_err(|e| PipelineError::schema(e.to_string()))?;

    if !(0..=100).contains(&draft.health_score) {
        return Err(PipelineError::schema(format!(
            "health_score {} outside 0..=100",
            draft.health_score
        )));
    }
    if let Some(bad) = draft
        .evidence
        .iter()
        .find(|c| !matches!(c.source_link.scheme(), "http" | "https"))
    {
        return Err(PipelineError::schema(format!(
            "source_link must be http(s): {}",
            bad.source_link
        )));
    }

    Ok(AuditedReport {
        health_score: draft.health_score as u8,
        scientific_summary: draft.scientific_summary,
        user_scenarios: draft.user_scenario,
        evidence: draft.evidence.into_iter().map(EvidenceClaim::from).collect(),
        warnings: Vec::new(),
        user_details: Vec::new(),
    })
}

/// Extract and validate in one step.
pub fn extract_report(text: &str) -> Result<AuditedReport, PipelineError> {
    match extract(text) {
        Some(obj) => validate_report(obj),
        None => {
            tracing::warn!(target: "extract", raw = %anon_hash(text), chars = text.len(), "no report object in model output");
            if text.contains("queries") {
                Err(PipelineError::schema(TOOL_ARGS_REASON))
            } else {
                Err(PipelineError::schema(NO_REPORT_REASON))
            }
        }
    }
}
