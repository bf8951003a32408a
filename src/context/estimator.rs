//! Token estimation.
//!
//! A fixed linear approximation: roughly 4 characters per token plus a
//! per-message overhead for role and framing metadata. The estimate does
//! not need to be exact — only monotonic in content length and consistent
//! across calls, so windows computed in one pass are comparable.

use super::Message;
use crate::config::ContextConfig;

/// Estimates token counts for messages and message sets.
#[derive(Debug, Clone, Copy)]
pub struct TokenEstimator {
    chars_per_token: usize,
    message_overhead: usize,
}

impl TokenEstimator {
    /// Create an estimator. `chars_per_token` is clamped to at least 1.
    pub fn new(chars_per_token: usize, message_overhead: usize) -> Self {
        Self {
            chars_per_token: chars_per_token.max(1),
            message_overhead,
        }
    }

    /// Build from the `[context]` configuration section.
    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.chars_per_token, config.message_overhead_tokens)
    }

    /// Estimated tokens for one message: `ceil(len / chars_per_token)`
    /// plus the fixed overhead.
    pub fn message(&self, message: &Message) -> usize {
        message.content.len().div_ceil(self.chars_per_token) + self.message_overhead
    }

    /// Estimated tokens for a message set.
    pub fn messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.message(m)).sum()
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}
