use thiserror::Error;

/// Structural failures that abort normalization of a whole document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("document must be a mapping")]
    NotAMapping,

    #[error("action chain exceeds the maximum of {limit} steps")]
    ChainTooLong { limit: usize },
}

/// Failures while turning raw generator output into a document.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("generator returned an empty response")]
    Empty,

    #[error("generator response is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
