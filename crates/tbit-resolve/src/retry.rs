//! Exponential backoff around a knowledge source.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tbit_rdfmap::AttributeQuery;
use tracing::warn;

use crate::error::SourceError;
use crate::source::{KnowledgeSource, SelectResults, SourceEntity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retries.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Retries `Unavailable` failures; every other outcome passes straight through.
pub struct RetryingSource<S> {
    inner: S,
    policy: RetryPolicy,
    sleep: fn(Duration),
}

impl<S> RetryingSource<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            sleep: std::thread::sleep,
        }
    }

    /// Replace the sleeper; tests pass a no-op.
    pub fn with_sleeper(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for RetryingSource<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingSource")
            .field("inner", &self.inner)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<S: KnowledgeSource> KnowledgeSource for RetryingSource<S> {
    fn select(
        &self,
        query: &AttributeQuery,
        subject: &SourceEntity,
    ) -> Result<SelectResults, SourceError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.select(query, subject) {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.policy.backoff_for(attempt);
                    warn!(
                        source = %self.inner.name(),
                        uri = %subject.uri,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "query failed, retrying"
                    );
                    (self.sleep)(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err.with_attempts(attempt)),
                Ok(results) => return Ok(results),
            }
        }
    }

    fn name(&self) -> String {
        self.inner.name()
    }
}
