//! Conversation Context Optimization
//!
//! Fits an unbounded message history into a model's fixed token budget.
//! The optimizer applies three stages in order, short-circuiting as soon
//! as the budget is met:
//!
//! 1. **Priority filter** — keep system messages, recent messages, and
//!    messages carrying code/command/file-operation markers
//! 2. **Summarization** — replace older messages with one cached summary
//!    produced by the text-generation collaborator
//! 3. **Truncation** — greedy newest-first fit, essential messages ahead
//!    of ordinary ones
//!
//! The returned window always fits the budget, except when even the
//! minimal essential set cannot — then the best-effort set is returned
//! with a warning, never an error.

mod estimator;
mod markers;
mod optimizer;
mod summarizer;

pub use estimator::TokenEstimator;
pub use markers::{contains_code, contains_command, contains_file_op, has_operational_marker};
pub use optimizer::ContextOptimizer;
pub use summarizer::{SUMMARY_TAG, Summarizer, history_key};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// When the message was produced. Messages without a timestamp never
    /// count as "recent" for the priority filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// A message stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Drop the timestamp.
    pub fn without_timestamp(mut self) -> Self {
        self.timestamp = None;
        self
    }
}

/// The optimizer's output: an ordered message set and its estimated token
/// count. Ephemeral — recomputed per optimization call, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextWindow {
    pub messages: Vec<Message>,
    pub total_tokens: usize,
}

impl ContextWindow {
    /// A window with no messages and zero tokens.
    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            total_tokens: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
