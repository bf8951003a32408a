//! The staged context optimization pipeline.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use super::estimator::TokenEstimator;
use super::markers::has_operational_marker;
use super::summarizer::Summarizer;
use super::{ContextWindow, Message, Role};
use crate::config::ContextConfig;

/// Reduces a message history to fit a token budget.
///
/// Construct one per process (or per request); the optimizer holds no
/// mutable state. Without a summarizer attached, optimization goes
/// straight from priority filtering to truncation.
pub struct ContextOptimizer {
    config: ContextConfig,
    estimator: TokenEstimator,
    summarizer: Option<Summarizer>,
}

impl ContextOptimizer {
    pub fn new(config: ContextConfig) -> Self {
        let estimator = TokenEstimator::from_config(&config);
        Self {
            config,
            estimator,
            summarizer: None,
        }
    }

    /// Attach a summarizer for the summarization stage.
    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Produce a window that fits `max_tokens`.
    ///
    /// Stages run in order and short-circuit once the budget is met:
    /// priority filter, then summarization (when a summarizer is
    /// attached), then greedy truncation. When the priority filter keeps
    /// nothing at all — an all-stale history with no system messages or
    /// markers — the newest `fallback_recent` messages are used instead,
    /// so a caller never gets an empty context out of a non-empty
    /// history that had room in the budget.
    ///
    /// This method never fails. If even a single message exceeds the
    /// budget, the best-effort (possibly empty) set is returned and a
    /// warning is logged.
    pub async fn optimize(&self, messages: &[Message], max_tokens: usize) -> ContextWindow {
        if messages.is_empty() {
            return ContextWindow::empty();
        }

        let now = Utc::now();
        let mut retained: Vec<Message> = messages
            .iter()
            .filter(|m| self.is_priority(m, now))
            .cloned()
            .collect();

        if retained.is_empty() {
            let skip = messages.len().saturating_sub(self.config.fallback_recent);
            retained = messages[skip..].to_vec();
            debug!(
                kept = retained.len(),
                "priority filter kept nothing, using most recent messages"
            );
        }

        let tokens = self.estimator.messages(&retained);
        if tokens <= max_tokens {
            debug!(kept = retained.len(), tokens, "window fits after priority filter");
            return ContextWindow {
                messages: retained,
                total_tokens: tokens,
            };
        }

        let candidates = self.summarize_older(retained).await;
        let tokens = self.estimator.messages(&candidates);
        if tokens <= max_tokens {
            debug!(kept = candidates.len(), tokens, "window fits after summarization");
            return ContextWindow {
                messages: candidates,
                total_tokens: tokens,
            };
        }

        let kept = self.truncate(&candidates, max_tokens);
        if kept.is_empty() {
            warn!(
                budget = max_tokens,
                "budget is below the smallest message, returning best-effort window"
            );
        }
        let total_tokens = self.estimator.messages(&kept);
        ContextWindow {
            messages: kept,
            total_tokens,
        }
    }

    /// Stage 1 predicate: system role, recent, or operationally marked.
    fn is_priority(&self, message: &Message, now: DateTime<Utc>) -> bool {
        if message.role == Role::System {
            return true;
        }
        if let Some(ts) = message.timestamp
            && now.signed_duration_since(ts) < Duration::minutes(self.config.recent_window_minutes)
        {
            return true;
        }
        has_operational_marker(&message.content)
    }

    /// Essential messages win truncation priority.
    fn is_essential(&self, message: &Message) -> bool {
        message.role == Role::System || has_operational_marker(&message.content)
    }

    /// Stage 3: keep the newest `preserve_recent` verbatim and replace
    /// everything older with one synthesized summary message. Falls
    /// through unchanged when no summarizer is attached, the history is
    /// already short, or the collaborator is unavailable.
    async fn summarize_older(&self, retained: Vec<Message>) -> Vec<Message> {
        let Some(summarizer) = &self.summarizer else {
            return retained;
        };
        let preserve = self.config.preserve_recent;
        if retained.len() <= preserve {
            return retained;
        }

        let split = retained.len() - preserve;
        let (older, recent) = retained.split_at(split);
        match summarizer.summarize(older).await {
            Some(text) => {
                debug!(replaced = older.len(), "older history replaced with summary");
                let summary =
                    Message::new(Role::System, format!("[Conversation summary] {}", text));
                let mut out = Vec::with_capacity(recent.len() + 1);
                out.push(summary);
                out.extend_from_slice(recent);
                out
            }
            None => retained,
        }
    }

    /// Stage 4: greedy newest-to-oldest fit, essential messages admitted
    /// first, chronological order restored in the result.
    fn truncate(&self, candidates: &[Message], max_tokens: usize) -> Vec<Message> {
        let mut selected: Vec<usize> = Vec::new();
        let mut used = 0usize;

        for essential_pass in [true, false] {
            for (idx, message) in candidates.iter().enumerate().rev() {
                if self.is_essential(message) != essential_pass {
                    continue;
                }
                let cost = self.estimator.message(message);
                if used + cost > max_tokens {
                    break;
                }
                used += cost;
                selected.push(idx);
            }
        }

        selected.sort_unstable();
        selected.into_iter().map(|i| candidates[i].clone()).collect()
    }
}
