//! Model catalog: token limits and per-token pricing.
//!
//! The registry is plain data injected where it is needed — one instance
//! per process (or per test), no global state. It answers two questions:
//! how many tokens of context a model can take (the optimizer's budget),
//! and what a token costs (recorded in cache entry metadata).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::ProviderError;

/// Limits and pricing for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Total context window in tokens.
    pub context_window: usize,
    /// Maximum output tokens per response.
    pub max_output_tokens: usize,
    /// Input cost per 1000 tokens, in dollars.
    #[serde(default)]
    pub input_cost_per_1k: f64,
    /// Output cost per 1000 tokens, in dollars.
    #[serde(default)]
    pub output_cost_per_1k: f64,
}

/// Catalog of known models.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelSpec>,
}

impl ModelRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with commonly used models. Values track
    /// published vendor limits and list pricing; override via
    /// `[models]` in `mnemo.toml` when they drift.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            "claude-3-5-sonnet",
            ModelSpec {
                context_window: 200_000,
                max_output_tokens: 8192,
                input_cost_per_1k: 0.003,
                output_cost_per_1k: 0.015,
            },
        );
        registry.register(
            "claude-3-5-haiku",
            ModelSpec {
                context_window: 200_000,
                max_output_tokens: 8192,
                input_cost_per_1k: 0.0008,
                output_cost_per_1k: 0.004,
            },
        );
        registry.register(
            "gpt-4o-mini",
            ModelSpec {
                context_window: 128_000,
                max_output_tokens: 16_384,
                input_cost_per_1k: 0.00015,
                output_cost_per_1k: 0.0006,
            },
        );
        registry
    }

    /// Add or replace a model.
    pub fn register(&mut self, name: impl Into<String>, spec: ModelSpec) {
        self.models.insert(name.into(), spec);
    }

    /// Merge catalog entries (e.g., from `mnemo.toml`) over the current
    /// set. Incoming entries win.
    pub fn merge(&mut self, models: HashMap<String, ModelSpec>) {
        self.models.extend(models);
    }

    /// Look up a model.
    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    /// Input tokens available for conversation context: the window minus
    /// the model's output reservation. This is the `max_tokens` handed to
    /// the context optimizer.
    pub fn context_budget(&self, model: &str) -> Result<usize, ProviderError> {
        let spec = self
            .models
            .get(model)
            .ok_or_else(|| ProviderError::UnknownModel(model.to_string()))?;
        Ok(spec.context_window.saturating_sub(spec.max_output_tokens))
    }

    /// Input cost of a single token, in dollars. Unknown models cost 0 —
    /// cost accounting is best-effort metadata, not a gate.
    pub fn cost_per_token(&self, model: &str) -> f64 {
        self.models
            .get(model)
            .map(|spec| spec.input_cost_per_1k / 1000.0)
            .unwrap_or(0.0)
    }

    /// Number of cataloged models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
