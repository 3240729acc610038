//! Errors surfaced at the research service boundary.
//!
//! Source failures never reach this type; they are logged and replaced by
//! fallbacks inside the aggregator. Only bad input and orchestration
//! failures propagate to callers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResearchError {
    /// Rejected before any fetch was attempted.
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ResearchError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ResearchError::InvalidInput(message.into())
    }
}

pub type ResearchResult<T> = std::result::Result<T, ResearchError>;
