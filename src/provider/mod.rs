//! Model-provider collaborator seam.
//!
//! The engine never speaks to an LLM API directly; it consumes a
//! `TextGenerator` supplied by the caller. `RetryingGenerator` wraps any
//! generator with bounded retry and exponential backoff for transient
//! failures — sustained unavailability is handled separately by the
//! context optimizer's fallback path.

pub mod registry;

use async_trait::async_trait;
use tracing::warn;

use crate::context::Message;
use crate::errors::ProviderError;

/// Request parameters for a generation call.
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl ModelParams {
    /// Conservative defaults for summarization work.
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 1024,
            temperature: 0.2,
        }
    }
}

/// Abstraction over the chat-completion transport for testability and to
/// keep the HTTP stack out of this crate. Real implementations live with
/// the caller; test double: `MockGenerator` (in test code).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send a prompt and return the generated text.
    async fn send(
        &self,
        system_prompt: &str,
        messages: &[Message],
        params: &ModelParams,
    ) -> Result<String, ProviderError>;
}

/// Bounded-retry wrapper around a generator.
///
/// Retries only failures the provider classifies as transient
/// (unavailable, timeout, rate limited), doubling the backoff between
/// attempts. Deterministic failures propagate immediately.
pub struct RetryingGenerator<G> {
    inner: G,
    max_attempts: u32,
    backoff: std::time::Duration,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, max_attempts: u32, backoff: std::time::Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    async fn send(
        &self,
        system_prompt: &str,
        messages: &[Message],
        params: &ModelParams,
    ) -> Result<String, ProviderError> {
        let mut delay = self.backoff;
        let mut attempt = 1;
        loop {
            match self.inner.send(system_prompt, messages, params).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    warn!(attempt, %err, "provider call failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Test double: fails the first `failures` calls, then succeeds.
    struct MockGenerator {
        failures: u32,
        transient: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TextGenerator for MockGenerator {
        async fn send(
            &self,
            _system_prompt: &str,
            _messages: &[Message],
            _params: &ModelParams,
        ) -> Result<String, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                if self.transient {
                    Err(ProviderError::Unavailable("503".into()))
                } else {
                    Err(ProviderError::Auth("bad key".into()))
                }
            } else {
                Ok("generated".to_string())
            }
        }
    }

    fn messages() -> Vec<Message> {
        vec![Message::new(Role::User, "summarize this")]
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let generator = RetryingGenerator::new(
            MockGenerator {
                failures: 2,
                transient: true,
                calls: AtomicU32::new(0),
            },
            3,
            std::time::Duration::from_millis(10),
        );

        let params = ModelParams::for_model("claude-3-5-haiku");
        let result = generator.send("sys", &messages(), &params).await.unwrap();
        assert_eq!(result, "generated");
        assert_eq!(generator.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let generator = RetryingGenerator::new(
            MockGenerator {
                failures: 10,
                transient: true,
                calls: AtomicU32::new(0),
            },
            3,
            std::time::Duration::from_millis(10),
        );

        let params = ModelParams::for_model("claude-3-5-haiku");
        let err = generator.send("sys", &messages(), &params).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(generator.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_deterministic_failures_do_not_retry() {
        let generator = RetryingGenerator::new(
            MockGenerator {
                failures: 10,
                transient: false,
                calls: AtomicU32::new(0),
            },
            3,
            std::time::Duration::from_millis(10),
        );

        let params = ModelParams::for_model("claude-3-5-haiku");
        let err = generator.send("sys", &messages(), &params).await.unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
        assert_eq!(generator.inner.calls.load(Ordering::SeqCst), 1);
    }
}
