// Machine translation with a primary provider, a secondary provider and a
// sentinel when both fail

pub mod deepl;
pub mod google;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::errors::{TranslationError, TranslationResult};
use crate::middleware::circuit_breaker::CircuitBreaker;

pub use deepl::DeepLClient;
pub use google::GoogleTranslateClient;

/// Source language value meaning "let the provider detect it"
pub const AUTO_DETECT: &str = "auto";

/// Infallible translation as seen by the pipeline
#[async_trait]
pub trait Translator: Send + Sync {
    /// Always returns a string: the translation, or a sentinel embedding the
    /// source text when every provider failed.
    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> String;
}

/// A single translation backend
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> TranslationResult<String>;
}

/// Text returned when no provider could translate `text`
pub fn failure_sentinel(text: &str) -> String {
    format!("[translation failed: {text}]")
}

/// Tries the primary provider, then the secondary, then gives up with the
/// sentinel. The primary sits behind a circuit breaker: while it is open,
/// requests go straight to the secondary.
pub struct FallbackTranslator {
    primary: Arc<dyn TranslationProvider>,
    secondary: Arc<dyn TranslationProvider>,
    circuit_breaker: CircuitBreaker,
}

impl FallbackTranslator {
    pub fn new(primary: Arc<dyn TranslationProvider>, secondary: Arc<dyn TranslationProvider>) -> Self {
        Self::with_circuit_breaker(primary, secondary, CircuitBreaker::default())
    }

    pub fn with_circuit_breaker(
        primary: Arc<dyn TranslationProvider>,
        secondary: Arc<dyn TranslationProvider>,
        circuit_breaker: CircuitBreaker,
    ) -> Self {
        Self {
            primary,
            secondary,
            circuit_breaker,
        }
    }

    async fn try_primary(&self, text: &str, source: &str, target: &str) -> TranslationResult<String> {
        if !self.circuit_breaker.allow_request() {
            return Err(TranslationError::CircuitOpen(self.primary.name()));
        }

        match self.primary.translate(text, source, target).await {
            Ok(translated) => {
                self.circuit_breaker.record_success();
                Ok(translated)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Translator for FallbackTranslator {
    async fn translate(&self, text: &str, source_language: &str, target_language: &str) -> String {
        debug!("Translating \"{}\" ({} -> {})", text, source_language, target_language);

        match self.try_primary(text, source_language, target_language).await {
            Ok(translated) => return translated,
            Err(e) => warn!("{} failed, falling back to {}: {}", self.primary.name(), self.secondary.name(), e),
        }

        match self.secondary.translate(text, source_language, target_language).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!("{} failed for \"{}\": {}", self.secondary.name(), text, e);
                failure_sentinel(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::circuit_breaker::CircuitBreakerConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeProvider {
        name: &'static str,
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn ok(name: &'static str, reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: Some(reply),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TranslationProvider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn translate(&self, _text: &str, _source: &str, _target: &str) -> TranslationResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Some(reply) => Ok(reply.to_string()),
                None => Err(TranslationError::ApiError {
                    provider: self.name,
                    status: 503,
                    body: "unavailable".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_primary_wins() {
        let primary = FakeProvider::ok("primary", "안녕");
        let secondary = FakeProvider::ok("secondary", "unused");
        let translator = FallbackTranslator::new(primary.clone(), secondary.clone());

        assert_eq!(translator.translate("HELLO", "auto", "ko").await, "안녕");
        assert_eq!(secondary.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_secondary() {
        let primary = FakeProvider::failing("primary");
        let secondary = FakeProvider::ok("secondary", "세계");
        let translator = FallbackTranslator::new(primary.clone(), secondary.clone());

        assert_eq!(translator.translate("WORLD", "auto", "ko").await, "세계");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_both_failing_yields_sentinel() {
        let translator = FallbackTranslator::new(FakeProvider::failing("primary"), FakeProvider::failing("secondary"));
        assert_eq!(translator.translate("HELLO", "en", "ko").await, "[translation failed: HELLO]");
    }

    #[tokio::test]
    async fn test_open_circuit_skips_primary() {
        let primary = FakeProvider::failing("primary");
        let secondary = FakeProvider::ok("secondary", "ok");
        let breaker = CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 2,
            timeout: Duration::from_secs(60),
            success_threshold: 1,
        });
        let translator = FallbackTranslator::with_circuit_breaker(primary.clone(), secondary.clone(), breaker);

        for _ in 0..4 {
            assert_eq!(translator.translate("x", "auto", "ko").await, "ok");
        }
        assert_eq!(primary.calls(), 2);
        assert_eq!(secondary.calls(), 4);
    }
}
