//! Bounded retries with exponential backoff and jitter.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that know whether trying again could help.
pub trait Retryable {
  fn is_retryable(&self) -> bool;
}

/// Final failure reported by [`RetryPolicy::run`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryError<E> {
  /// Every attempt failed with a retryable error.
  #[error("gave up after {attempts} attempts: {last}")]
  Exhausted { attempts: u32, last: E },

  /// The operation failed in a way retrying cannot fix.
  #[error("{0}")]
  Terminal(E),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
  max_attempts: u32,
  base_delay: Duration,
  max_delay: Duration,
  /// Upper bound of the random delay added to each backoff
  jitter: Duration,
}

impl RetryPolicy {
  pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
    Self {
      max_attempts: max_attempts.max(1),
      base_delay,
      max_delay,
      jitter: Duration::ZERO,
    }
  }

  pub fn with_jitter(mut self, jitter: Duration) -> Self {
    self.jitter = jitter;
    self
  }

  pub fn max_attempts(&self) -> u32 {
    self.max_attempts
  }

  /// Backoff after failed `attempt` (1-based), before jitter:
  /// `base_delay * 2^(attempt-1)`, capped at `max_delay`.
  pub fn backoff(&self, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    self
      .base_delay
      .checked_mul(1u32 << exponent)
      .unwrap_or(self.max_delay)
      .min(self.max_delay)
  }

  fn delay_for(&self, attempt: u32) -> Duration {
    self.backoff(attempt) + self.random_jitter()
  }

  fn random_jitter(&self) -> Duration {
    let bound = self.jitter.as_millis() as u64;
    if bound == 0 {
      return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=bound))
  }

  /// Run `op` until it succeeds, fails terminally, or runs out of attempts.
  ///
  /// `op` receives the 1-based attempt number.
  pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
  where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
  {
    let mut attempt = 1;
    loop {
      match op(attempt).await {
        Ok(value) => return Ok(value),
        Err(err) if !err.is_retryable() => {
          debug!(attempt, error = %err, "non-retryable failure");
          return Err(RetryError::Terminal(err));
        }
        Err(err) if attempt >= self.max_attempts => {
          warn!(attempts = attempt, error = %err, "retries exhausted");
          return Err(RetryError::Exhausted {
            attempts: attempt,
            last: err,
          });
        }
        Err(err) => {
          let delay = self.delay_for(attempt);
          warn!(
            attempt,
            max_attempts = self.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "attempt failed, retrying"
          );
          tokio::time::sleep(delay).await;
          attempt += 1;
        }
      }
    }
  }
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self::new(3, Duration::from_millis(500), Duration::from_secs(10))
      .with_jitter(Duration::from_millis(250))
  }
}
