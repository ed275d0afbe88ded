// src/error.rs
//! Pipeline-level failures. Per-item failures (one dead query, one dead link) never
//! show up here; they are absorbed as empty results or report warnings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The generation capability returned no text at all.
    #[error("generation returned empty content")]
    GenerationEmpty,

    /// No qualifying JSON record, or the record failed type validation.
    #[error("invalid report: {reason}")]
    SchemaInvalid { reason: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("pipeline timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Resource acquisition or generator transport failure.
    #[error("pipeline setup failed: {0}")]
    Setup(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn schema(reason: impl Into<String>) -> Self {
        Self::SchemaInvalid {
            reason: reason.into(),
        }
    }

    pub fn input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::GenerationEmpty => "generation_empty",
            PipelineError::SchemaInvalid { .. } => "schema_invalid",
            PipelineError::InvalidInput { .. } => "invalid_input",
            PipelineError::Timeout { .. } => "timeout",
            PipelineError::Setup(_) => "setup",
        }
    }

    /// Human-readable failure reason for callers and failure records.
    pub fn reason(&self) -> String {
        match self {
            PipelineError::Setup(e) => format!("pipeline setup failed: {e:#}"),
            other => other.to_string(),
        }
    }

    /// Whether a queue layer may reasonably try the same input again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::GenerationEmpty | PipelineError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_reasons() {
        let e = PipelineError::schema("missing health_score");
        assert_eq!(e.kind(), "schema_invalid");
        assert_eq!(e.reason(), "invalid report: missing health_score");
        assert!(!e.is_retryable());

        let g = PipelineError::GenerationEmpty;
        assert_eq!(g.kind(), "generation_empty");
        assert!(g.is_retryable());

        let s: PipelineError = anyhow::anyhow!("boom").context("building client").into();
        assert_eq!(s.kind(), "setup");
        assert!(s.reason().contains("building client: boom"));
    }
}
