//! Bounded retry wrapper for the fact extractor
//!
//! Extraction is the one pipeline step with an inline retry policy: it is
//! an external model call, it happens before any store write, and retrying
//! it cannot duplicate state.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::Result;

use super::models::ExtractedFact;
use super::FactExtractor;

/// Decorator adding exponential backoff with jitter to any extractor
pub struct RetryingExtractor<E: FactExtractor> {
    inner: E,
    config: RetryConfig,
}

impl<E: FactExtractor> RetryingExtractor<E> {
    pub fn new(inner: E, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    fn compute_delay(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let jitter = base * 0.1 * rand::thread_rng().gen::<f64>();
        let delay = ((base + jitter) as u64).min(self.config.max_delay_ms);
        Duration::from_millis(delay)
    }
}

#[async_trait]
impl<E: FactExtractor> FactExtractor for RetryingExtractor<E> {
    async fn extract(&self, text: &str, history: &[String]) -> Result<Vec<ExtractedFact>> {
        let mut attempt = 0;
        loop {
            match self.inner.extract(text, history).await {
                Ok(facts) => return Ok(facts),
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        return Err(e);
                    }
                    let delay = self.compute_delay(attempt);
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying fact extraction"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
