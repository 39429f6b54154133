//! Engine diagnostics
//!
//! Indexing programs report trouble as free text. Engine adapters turn that
//! text into a [`FailureReport`] here, so that the classifier and the retry
//! loop only ever look at structured data.

use crate::model::UnitCell;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static INACCURATE_SOLUTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)solution\s+is\s+inaccurate").unwrap());

static INSUFFICIENT_PERCENTAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)insufficient\s+percentage\s*\(\s*<\s*(\d+(?:\.\d+)?)\s*%\s*\)").unwrap()
});

static PERCENT_INDEXED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:%|percent)\s+of\s+(?:the\s+)?(?:spots|reflections)\s+(?:were\s+)?indexed")
        .unwrap()
});

/// What went wrong, as far as the orchestration layer cares
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureKind {
    /// Refinement gave an imprecise but usable P1 orientation
    SolutionInaccurate,
    /// Fewer reflections indexed than the engine wants
    InsufficientIndexed { threshold_percent: Option<f64> },
    /// Anything else: bad input, crash, no solution
    Other,
}

impl FailureKind {
    pub fn from_diagnostic(raw: &str) -> Self {
        if INACCURATE_SOLUTION.is_match(raw) {
            return FailureKind::SolutionInaccurate;
        }

        if let Some(caps) = INSUFFICIENT_PERCENTAGE.captures(raw) {
            let threshold_percent = caps.get(1).and_then(|m| m.as_str().parse().ok());
            return FailureKind::InsufficientIndexed { threshold_percent };
        }

        FailureKind::Other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::SolutionInaccurate => "solution_inaccurate",
            FailureKind::InsufficientIndexed { .. } => "insufficient_indexed",
            FailureKind::Other => "other",
        }
    }
}

/// A failed indexing attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub diagnostic: String,
    pub kind: FailureKind,
    pub percent_indexed: Option<f64>,
    /// Cell the engine arrived at despite complaining
    pub proposed_cell: Option<UnitCell>,
}

impl FailureReport {
    /// Build a report from raw engine text
    pub fn from_diagnostic(diagnostic: impl Into<String>) -> Self {
        let diagnostic = diagnostic.into();
        let kind = FailureKind::from_diagnostic(&diagnostic);
        let percent_indexed = PERCENT_INDEXED
            .captures(&diagnostic)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok());

        Self {
            diagnostic,
            kind,
            percent_indexed,
            proposed_cell: None,
        }
    }

    /// A report whose kind is already known (no text matching)
    pub fn new(diagnostic: impl Into<String>, kind: FailureKind) -> Self {
        Self {
            diagnostic: diagnostic.into(),
            kind,
            percent_indexed: None,
            proposed_cell: None,
        }
    }

    pub fn with_proposed_cell(mut self, cell: UnitCell) -> Self {
        self.proposed_cell = Some(cell);
        self
    }

    pub fn with_percent_indexed(mut self, percent: f64) -> Self {
        self.percent_indexed = Some(percent);
        self
    }
}

impl std::fmt::Display for FailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.diagnostic)
    }
}
