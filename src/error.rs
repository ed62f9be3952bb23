//! Error types for NutriScan

use thiserror::Error;

/// Errors that can occur during scoring or analysis handling
#[derive(Debug, Error)]
pub enum NutriError {
    /// Malformed engine arguments (negative quantity, hour outside 0-23,
    /// malformed rule window). Fatal to the single call.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The AI provider failed or returned a payload that could not be
    /// validated. The caller substitutes a "no result" state and may retry.
    #[error("Analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl NutriError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        NutriError::InvalidInput(msg.into())
    }

    pub(crate) fn unavailable(msg: impl Into<String>) -> Self {
        NutriError::AnalysisUnavailable(msg.into())
    }

    /// True for boundary failures the caller may retry
    pub fn is_recoverable(&self) -> bool {
        matches!(self, NutriError::AnalysisUnavailable(_))
    }
}

/// Errors reported by an [`AnalysisProvider`](crate::pipeline::AnalysisProvider)
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider timed out after {0} ms")]
    Timeout(u64),

    #[error("Provider transport error: {0}")]
    Transport(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,
}
