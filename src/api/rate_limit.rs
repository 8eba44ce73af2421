//! Process-wide pacing of outbound requests.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as Gcra};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Caps outbound requests at `max_requests` per rolling `window`.
///
/// Backed by a GCRA bucket: up to `max_requests` calls pass immediately,
/// after which one slot frees up every `window / max_requests`. One instance
/// is shared by every fetcher in the process.
pub struct RateLimiter {
  inner: Option<DefaultDirectRateLimiter>,
}

impl RateLimiter {
  pub fn new(max_requests: NonZeroU32, window: Duration) -> Self {
    let inner = Quota::with_period(window / max_requests.get())
      .map(|quota| Gcra::direct(quota.allow_burst(max_requests)));
    if inner.is_none() {
      debug!("rate limit window is zero, requests are unpaced");
    }
    Self { inner }
  }

  /// A limiter that never waits.
  pub fn unlimited() -> Self {
    Self { inner: None }
  }

  /// Wait until a request slot is available. Never fails.
  pub async fn acquire(&self) {
    if let Some(limiter) = &self.inner {
      limiter.until_ready().await;
    }
  }
}
