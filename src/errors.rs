//! Typed error hierarchy for the mnemo engine.
//!
//! Two top-level enums cover the two subsystems:
//! - `CacheError` — cache store and index failures
//! - `ProviderError` — model-provider collaborator failures
//!
//! Degraded runtime conditions (a missing entry, a stale index reference,
//! an unavailable summarization backend) are NOT errors in this crate —
//! they surface as `None`, empty results, or a fallback path. The variants
//! below cover programmer errors and genuine I/O faults.

use thiserror::Error;

/// Errors from the cache store and tag index.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid cache level {level}: levels are 0 (raw) through 3 (meta)")]
    InvalidLevel { level: u8 },

    #[error("Failed to write cache entry at {path}: {source}")]
    EntryWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write tag index at {path}: {source}")]
    IndexWriteFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize cache record: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors from the model-provider collaborator.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Provider rate limited")]
    RateLimited,

    #[error("Provider authentication failed: {0}")]
    Auth(String),

    #[error("Provider returned a malformed response: {0}")]
    Malformed(String),

    #[error("Unknown model '{0}'")]
    UnknownModel(String),
}

impl ProviderError {
    /// Whether a retry has any chance of succeeding.
    ///
    /// Auth failures, malformed responses, and unknown models are
    /// deterministic and must not be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable(_)
                | ProviderError::Timeout { .. }
                | ProviderError::RateLimited
        )
    }
}
