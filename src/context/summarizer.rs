//! Cached history summarization.
//!
//! When the optimizer replaces older messages with a summary, the summary
//! is keyed by a fingerprint of the replaced messages and stored at the
//! `summary` cache level. Re-optimizing the same history reuses the
//! cached summary instead of calling the collaborator again.
//!
//! The collaborator call is time-boxed; a timeout or provider failure
//! yields `None` and the optimizer falls through to truncation.

use std::sync::Arc;
use tracing::{debug, warn};

use super::Message;
use crate::cache::{CacheLevel, CacheStore, compute_id};
use crate::provider::{ModelParams, TextGenerator};

/// Tag carried by every cached context summary.
pub const SUMMARY_TAG: &str = "context-summary";

const SUMMARY_SYSTEM_PROMPT: &str = "Summarize the following conversation history in a few \
     sentences. Preserve decisions made, file paths touched, commands run, and unresolved \
     errors. Omit pleasantries.";

/// The cache key of a replaced history segment: a fingerprint over every
/// message's role and content, in order.
pub fn history_key(messages: &[Message]) -> String {
    let mut joined = String::new();
    for message in messages {
        joined.push_str(&format!("{:?}", message.role));
        joined.push(':');
        joined.push_str(&message.content);
        joined.push('\n');
    }
    compute_id(&joined)
}

fn history_tag(key: &str) -> String {
    format!("history:{}", key)
}

/// Produces (and caches) summaries of older conversation history.
pub struct Summarizer {
    store: Arc<CacheStore>,
    generator: Arc<dyn TextGenerator>,
    params: ModelParams,
    timeout: std::time::Duration,
}

impl Summarizer {
    pub fn new(
        store: Arc<CacheStore>,
        generator: Arc<dyn TextGenerator>,
        model: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            generator,
            params: ModelParams::for_model(model),
            timeout,
        }
    }

    /// Summarize `older`, reusing a cached summary when one exists.
    ///
    /// Returns `None` when the collaborator is unavailable or times out —
    /// the caller falls back to truncation. A cache write failure only
    /// loses reuse, not the summary, so it is logged and ignored.
    pub async fn summarize(&self, older: &[Message]) -> Option<String> {
        if older.is_empty() {
            return None;
        }

        let key = history_key(older);
        let tag = history_tag(&key);

        let cached = self
            .store
            .find_by_tags(&[tag.clone()], CacheLevel::Summary)
            .await;
        if let Some(entry) = cached.first() {
            debug!(%key, "reusing cached context summary");
            return Some(entry.content.clone());
        }

        let call = self.generator.send(SUMMARY_SYSTEM_PROMPT, older, &self.params);
        let text = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                warn!(%err, "summarization backend failed");
                return None;
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "summarization timed out");
                return None;
            }
        };

        let tags = vec![SUMMARY_TAG.to_string(), tag];
        if let Err(err) = self
            .store
            .store(CacheLevel::Summary, &text, &tags, None, None)
            .await
        {
            warn!(%err, "failed to cache context summary");
        }

        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use crate::errors::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    struct MockGenerator {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl TextGenerator for MockGenerator {
        async fn send(
            &self,
            _system_prompt: &str,
            _messages: &[Message],
            _params: &ModelParams,
        ) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ProviderError::Unavailable("down".into()))
            } else {
                Ok("the conversation covered cache design".to_string())
            }
        }
    }

    fn history() -> Vec<Message> {
        vec![
            Message::new(Role::User, "how should the cache work?"),
            Message::new(Role::Assistant, "four levels, content-addressed"),
        ]
    }

    #[test]
    fn test_history_key_is_deterministic_and_order_sensitive() {
        let msgs = history();
        assert_eq!(history_key(&msgs), history_key(&msgs));

        let mut reversed = msgs.clone();
        reversed.reverse();
        assert_ne!(history_key(&msgs), history_key(&reversed));
    }

    #[tokio::test]
    async fn test_summarize_generates_and_caches() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CacheStore::new(dir.path()));
        let generator = Arc::new(MockGenerator {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let summarizer = Summarizer::new(
            store.clone(),
            generator.clone(),
            "claude-3-5-haiku",
            std::time::Duration::from_secs(30),
        );

        let msgs = history();
        let first = summarizer.summarize(&msgs).await.unwrap();
        assert!(first.contains("cache design"));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);

        // The summary landed in the cache, tagged for reuse
        let cached = store
            .find_by_tags(&[SUMMARY_TAG.to_string()], CacheLevel::Summary)
            .await;
        assert_eq!(cached.len(), 1);

        // Second call is served from the cache
        let second = summarizer.summarize(&msgs).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_summarize_unavailable_backend_is_none() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CacheStore::new(dir.path()));
        let generator = Arc::new(MockGenerator {
            calls: AtomicU32::new(0),
            fail: true,
        });
        let summarizer = Summarizer::new(
            store,
            generator,
            "claude-3-5-haiku",
            std::time::Duration::from_secs(30),
        );

        assert!(summarizer.summarize(&history()).await.is_none());
    }

    #[tokio::test]
    async fn test_summarize_empty_history_is_none() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(CacheStore::new(dir.path()));
        let generator = Arc::new(MockGenerator {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let summarizer = Summarizer::new(
            store,
            generator,
            "claude-3-5-haiku",
            std::time::Duration::from_secs(30),
        );

        assert!(summarizer.summarize(&[]).await.is_none());
    }
}
