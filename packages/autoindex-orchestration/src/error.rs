use crate::config::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No images available for indexing")]
    NoImages,

    /// The engine reported a failure that could not be recovered from.
    /// `diagnostic` is the engine's text, unmodified.
    #[error("Indexing failed ({category}): {diagnostic}")]
    IndexingFailed {
        diagnostic: String,
        category: FailureCategory,
    },

    #[error("Retry limit exceeded after {attempts} attempts: {diagnostic}")]
    RetryLimitExceeded { attempts: u32, diagnostic: String },

    #[error("Missing payload entry: {0}")]
    MissingPayload(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl OrchestratorError {
    pub fn invalid_input<E: std::fmt::Display>(e: E) -> Self {
        Self::InvalidInput(e.to_string())
    }

    /// Engine diagnostic carried by this error, if it came from the engine.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::IndexingFailed { diagnostic, .. }
            | Self::RetryLimitExceeded { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}

/// Failure category for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FailureCategory {
    /// Engine finished with a usable but imperfect result - resume from it
    RetryableContinue,
    /// Resume only if the proposed cell agrees with the target cell
    RetryableIfCellClose,
    /// Unrecoverable - propagate the original diagnostic
    Fatal,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::RetryableContinue => "retryable-continue",
            FailureCategory::RetryableIfCellClose => "retryable-if-cell-close",
            FailureCategory::Fatal => "fatal",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "retryable-continue" => Ok(FailureCategory::RetryableContinue),
            "retryable-if-cell-close" => Ok(FailureCategory::RetryableIfCellClose),
            "fatal" => Ok(FailureCategory::Fatal),
            _ => Err(OrchestratorError::invalid_input(format!(
                "Invalid failure category: {}",
                s
            ))),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, FailureCategory::Fatal)
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
