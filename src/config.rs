//! Unified configuration for mnemo.
//!
//! Reads from `mnemo.toml`. Every field has a sensible default so the
//! engine works with no file present at all.
//!
//! # Configuration File Format
//!
//! ```toml
//! [cache]
//! root = "/home/user/.cache/mnemo"
//! max_age_days = 7
//! cleanup_interval_hours = 24
//! search_threshold = 0.8
//! model = "claude-3-5-sonnet"
//!
//! [context]
//! chars_per_token = 4
//! message_overhead_tokens = 20
//! recent_window_minutes = 30
//! preserve_recent = 8
//! fallback_recent = 10
//!
//! [summarizer]
//! enabled = true
//! timeout_secs = 30
//! model = "claude-3-5-haiku"
//!
//! [provider]
//! max_attempts = 3
//! backoff_ms = 250
//!
//! [models."internal-large"]
//! context_window = 100000
//! max_output_tokens = 8192
//! input_cost_per_1k = 0.002
//! output_cost_per_1k = 0.008
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::provider::registry::ModelSpec;

/// Cache store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root directory for the on-disk cache. Defaults to
    /// `<platform cache dir>/mnemo`.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Entries older than this are removed by cleanup.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
    /// How often the janitor runs a cleanup pass.
    #[serde(default = "default_cleanup_interval_hours")]
    pub cleanup_interval_hours: u32,
    /// Minimum similarity for a search hit.
    #[serde(default = "default_search_threshold")]
    pub search_threshold: f32,
    /// Model whose per-token cost is recorded in entry metadata.
    #[serde(default = "default_cache_model")]
    pub model: String,
}

/// Context optimizer settings.
///
/// The token arithmetic here is a heuristic (roughly 4 characters per
/// token plus a fixed per-message overhead). It only needs to be monotonic
/// and consistent across calls, not exact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Characters per estimated token.
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    /// Fixed token-equivalent overhead charged per message for role and
    /// framing metadata.
    #[serde(default = "default_message_overhead_tokens")]
    pub message_overhead_tokens: usize,
    /// Messages younger than this survive the priority filter.
    #[serde(default = "default_recent_window_minutes")]
    pub recent_window_minutes: i64,
    /// Newest messages kept verbatim when summarizing.
    #[serde(default = "default_preserve_recent")]
    pub preserve_recent: usize,
    /// Newest messages returned when the optimizer hits an internal
    /// failure and falls back.
    #[serde(default = "default_fallback_recent")]
    pub fallback_recent: usize,
}

/// Summarization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Whether the optimizer may call the text-generation collaborator.
    /// When off, optimization goes straight from priority filtering to
    /// truncation.
    #[serde(default = "default_summarizer_enabled")]
    pub enabled: bool,
    /// Bounded wait for one summarization call.
    #[serde(default = "default_summarizer_timeout_secs")]
    pub timeout_secs: u64,
    /// Model used for summaries (should be cheap and fast).
    #[serde(default = "default_summarizer_model")]
    pub model: String,
}

/// Model-provider retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Total attempts per request (1 = no retry).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff between attempts; doubles each retry.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_age_days() -> u32 {
    7
}

fn default_cleanup_interval_hours() -> u32 {
    24
}

fn default_search_threshold() -> f32 {
    0.8
}

fn default_cache_model() -> String {
    "claude-3-5-sonnet".to_string()
}

fn default_chars_per_token() -> usize {
    4
}

fn default_message_overhead_tokens() -> usize {
    20
}

fn default_recent_window_minutes() -> i64 {
    30
}

fn default_preserve_recent() -> usize {
    8
}

fn default_fallback_recent() -> usize {
    10
}

fn default_summarizer_enabled() -> bool {
    true
}

fn default_summarizer_timeout_secs() -> u64 {
    30
}

fn default_summarizer_model() -> String {
    "claude-3-5-haiku".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    250
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            max_age_days: default_max_age_days(),
            cleanup_interval_hours: default_cleanup_interval_hours(),
            search_threshold: default_search_threshold(),
            model: default_cache_model(),
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            chars_per_token: default_chars_per_token(),
            message_overhead_tokens: default_message_overhead_tokens(),
            recent_window_minutes: default_recent_window_minutes(),
            preserve_recent: default_preserve_recent(),
            fallback_recent: default_fallback_recent(),
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: default_summarizer_enabled(),
            timeout_secs: default_summarizer_timeout_secs(),
            model: default_summarizer_model(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Root configuration, the deserialized form of `mnemo.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MnemoToml {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Extra model catalog entries, merged over the built-in registry.
    #[serde(default)]
    pub models: HashMap<String, ModelSpec>,
}

impl MnemoToml {
    /// Load configuration from the given file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: MnemoToml = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file does
    /// not exist. A present-but-invalid file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the cache root: the configured path, or the platform cache
    /// directory, or `.mnemo` in the working directory as a last resort.
    pub fn cache_root(&self) -> PathBuf {
        if let Some(root) = &self.cache.root {
            return root.clone();
        }
        dirs::cache_dir()
            .map(|d| d.join("mnemo"))
            .unwrap_or_else(|| PathBuf::from(".mnemo"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_sensible() {
        let config = MnemoToml::default();
        assert_eq!(config.cache.max_age_days, 7);
        assert_eq!(config.cache.cleanup_interval_hours, 24);
        assert!((config.cache.search_threshold - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.context.chars_per_token, 4);
        assert_eq!(config.context.message_overhead_tokens, 20);
        assert_eq!(config.context.recent_window_minutes, 30);
        assert_eq!(config.context.preserve_recent, 8);
        assert_eq!(config.context.fallback_recent, 10);
        assert!(config.summarizer.enabled);
        assert_eq!(config.provider.max_attempts, 3);
        assert!(config.models.is_empty());
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = TempDir::new().unwrap();
        let config = MnemoToml::load_or_default(&dir.path().join("mnemo.toml")).unwrap();
        assert_eq!(config.cache.max_age_days, 7);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mnemo.toml");
        std::fs::write(
            &path,
            r#"
[cache]
max_age_days = 14

[context]
preserve_recent = 5
"#,
        )
        .unwrap();

        let config = MnemoToml::load_or_default(&path).unwrap();
        assert_eq!(config.cache.max_age_days, 14);
        assert_eq!(config.context.preserve_recent, 5);
        // Untouched sections keep defaults
        assert_eq!(config.context.chars_per_token, 4);
        assert_eq!(config.summarizer.timeout_secs, 30);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mnemo.toml");
        std::fs::write(&path, "this is not toml [[[").unwrap();
        assert!(MnemoToml::load_or_default(&path).is_err());
    }

    #[test]
    fn configured_root_wins() {
        let mut config = MnemoToml::default();
        config.cache.root = Some(PathBuf::from("/tmp/custom-cache"));
        assert_eq!(config.cache_root(), PathBuf::from("/tmp/custom-cache"));
    }

    #[test]
    fn model_catalog_entries_parse() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mnemo.toml");
        std::fs::write(
            &path,
            r#"
[models."internal-large"]
context_window = 100000
max_output_tokens = 8192
input_cost_per_1k = 0.002
output_cost_per_1k = 0.008
"#,
        )
        .unwrap();

        let config = MnemoToml::load(&path).unwrap();
        let spec = config.models.get("internal-large").unwrap();
        assert_eq!(spec.context_window, 100_000);
        assert_eq!(spec.max_output_tokens, 8192);
    }
}
