//! Retry wrapper with bounded exponential backoff.
//!
//! Wraps any [`ImageApi`] and retries transient failures (transport errors,
//! rate limits) with a doubling, capped delay. Auth problems, content
//! refusals and invalid requests fail immediately.

use crate::client::{ImageApi, ImageResult, InlineImage};
use crate::types::Content;
use async_trait::async_trait;
use gemimg_common::config::RetryConfig;
use gemimg_common::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// An [`ImageApi`] that retries the inner implementation.
pub struct ResilientApi {
    inner: Arc<dyn ImageApi>,
    config: RetryConfig,
}

impl ResilientApi {
    pub fn new(inner: Arc<dyn ImageApi>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Calculate backoff delay for a given attempt.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self
            .config
            .base_backoff_ms
            .saturating_mul(2_u64.saturating_pow(attempt))
            .min(self.config.max_backoff_ms);
        Duration::from_millis(delay_ms)
    }

    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>> + Send,
    {
        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!(op, attempt = attempt + 1, "Call recovered after retries");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    if !e.is_retryable() || attempt == self.config.max_retries {
                        return Err(e);
                    }
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        op,
                        attempt = attempt + 1,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Call failed, retrying"
                    );
                    last_err = Some(e);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // Loop always returns before falling through; keep the compiler and
        // the invariant honest.
        Err(last_err.unwrap_or_else(|| {
            gemimg_common::Error::External(format!("{op}: retry budget exhausted"))
        }))
    }
}

#[async_trait]
impl ImageApi for ResilientApi {
    async fn generate(&self, prompt: &str, history: &[Content]) -> Result<ImageResult> {
        self.run("generate", || self.inner.generate(prompt, history))
            .await
    }

    async fn edit(
        &self,
        prompt: &str,
        image: &InlineImage,
        history: &[Content],
    ) -> Result<ImageResult> {
        self.run("edit", || self.inner.edit(prompt, image, history))
            .await
    }

    async fn compose(&self, prompt: &str, images: &[InlineImage]) -> Result<ImageResult> {
        self.run("compose", || self.inner.compose(prompt, images))
            .await
    }

    async fn describe(&self, prompt: &str, image: Option<&InlineImage>) -> Result<ImageResult> {
        self.run("describe", || self.inner.describe(prompt, image))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemimg_common::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock backend that fails a configurable number of times.
    struct FlakyApi {
        calls: Arc<AtomicUsize>,
        fail_until: usize,
        error: fn() -> Error,
    }

    impl FlakyApi {
        fn new(fail_until: usize, error: fn() -> Error) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    calls: Arc::clone(&calls),
                    fail_until,
                    error,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl ImageApi for FlakyApi {
        async fn generate(&self, _prompt: &str, _history: &[Content]) -> Result<ImageResult> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.fail_until {
                return Err((self.error)());
            }
            Ok(ImageResult {
                image: Some(vec![1]),
                text: Some("ok".into()),
            })
        }

        async fn edit(&self, prompt: &str, _: &InlineImage, history: &[Content]) -> Result<ImageResult> {
            self.generate(prompt, history).await
        }

        async fn compose(&self, prompt: &str, _: &[InlineImage]) -> Result<ImageResult> {
            self.generate(prompt, &[]).await
        }

        async fn describe(&self, prompt: &str, _: Option<&InlineImage>) -> Result<ImageResult> {
            self.generate(prompt, &[]).await
        }
    }

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_backoff_ms: 1,
            max_backoff_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_succeeds_without_retry() {
        let (api, calls) = FlakyApi::new(0, || Error::External("down".into()));
        let resilient = ResilientApi::new(Arc::new(api), fast_config(2));

        let result = resilient.generate("x", &[]).await.unwrap();
        assert_eq!(result.text.as_deref(), Some("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let (api, calls) = FlakyApi::new(2, || Error::External("down".into()));
        let resilient = ResilientApi::new(Arc::new(api), fast_config(2));

        assert!(resilient.generate("x", &[]).await.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3); // 2 failures + 1 success
    }

    #[tokio::test]
    async fn test_budget_exhaustion_returns_error() {
        let (api, calls) = FlakyApi::new(usize::MAX, || Error::External("down".into()));
        let resilient = ResilientApi::new(Arc::new(api), fast_config(2));

        let err = resilient.generate("x", &[]).await.unwrap_err();
        assert!(matches!(err, Error::External(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 3); // initial + 2 retries
    }

    #[tokio::test]
    async fn test_refusal_is_not_retried() {
        let (api, calls) = FlakyApi::new(usize::MAX, || Error::Refused("safety".into()));
        let resilient = ResilientApi::new(Arc::new(api), fast_config(3));

        let err = resilient.generate("x", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Refused(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_config_error_is_not_retried() {
        let (api, calls) = FlakyApi::new(usize::MAX, || Error::Config("no key".into()));
        let resilient = ResilientApi::new(Arc::new(api), fast_config(3));

        assert!(resilient.describe("x", None).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let (api, _) = FlakyApi::new(0, || Error::External("down".into()));
        let resilient = ResilientApi::new(
            Arc::new(api),
            RetryConfig {
                max_retries: 10,
                base_backoff_ms: 100,
                max_backoff_ms: 500,
            },
        );

        assert_eq!(resilient.backoff_delay(0).as_millis(), 100);
        assert_eq!(resilient.backoff_delay(1).as_millis(), 200);
        assert_eq!(resilient.backoff_delay(2).as_millis(), 400);
        assert_eq!(resilient.backoff_delay(3).as_millis(), 500);
        assert_eq!(resilient.backoff_delay(20).as_millis(), 500);
    }
}
