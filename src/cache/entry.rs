//! Cache entries and lookup results.

use std::time::Duration;
use tokio::time::Instant;

/// A stored value with its expiry data.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  pub value: V,
  /// When the value was stored
  pub stored_at: Instant,
  /// How long the value may be served
  pub ttl: Duration,
}

impl<V> CacheEntry<V> {
  pub fn new(value: V, ttl: Duration) -> Self {
    Self {
      value,
      stored_at: Instant::now(),
      ttl,
    }
  }

  /// An entry is servable while `now - stored_at < ttl`.
  pub fn is_valid_at(&self, now: Instant) -> bool {
    now.saturating_duration_since(self.stored_at) < self.ttl
  }

  pub fn is_valid(&self) -> bool {
    self.is_valid_at(Instant::now())
  }
}

/// Indicates where a looked-up value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// This caller ran the fetch
  Network,
  /// Served from a valid cache entry
  Fresh,
  /// Attached to a fetch another caller already had in flight
  Joined,
}

/// Result of [`ResponseCache::get_or_fetch`](super::ResponseCache::get_or_fetch).
#[derive(Debug, Clone)]
pub struct Lookup<V> {
  pub value: V,
  pub source: CacheSource,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn test_entry_expires_at_ttl() {
    let entry = CacheEntry::new("standings", Duration::from_secs(10));
    assert!(entry.is_valid());

    tokio::time::advance(Duration::from_millis(9_999)).await;
    assert!(entry.is_valid());

    tokio::time::advance(Duration::from_millis(1)).await;
    assert!(!entry.is_valid());
  }

  #[tokio::test(start_paused = true)]
  async fn test_zero_ttl_is_never_valid() {
    let entry = CacheEntry::new(1u8, Duration::ZERO);
    assert!(!entry.is_valid());
  }
}
