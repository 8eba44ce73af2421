//! Response cache with TTL expiry and single-flight fetching.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use super::entry::{CacheEntry, CacheSource, Lookup};
use super::key::RequestKey;

type Inflight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

enum Slot<V, E> {
  Ready(CacheEntry<V>),
  Pending(Inflight<V, E>),
}

/// In-memory cache keyed by [`RequestKey`] fingerprint.
///
/// At most one fetch per key is in flight at any time: callers that arrive
/// while a fetch is pending attach to it and receive the same outcome.
/// Failures are handed to every waiter and are never stored.
///
/// The slot map is behind a mutex that is only held for map operations,
/// never across an await, so fetches for different keys proceed in parallel.
/// Expired entries are replaced lazily by the next lookup for their key.
pub struct ResponseCache<V, E> {
  slots: Mutex<HashMap<String, Slot<V, E>>>,
}

impl<V, E> ResponseCache<V, E>
where
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      slots: Mutex::new(HashMap::new()),
    }
  }

  /// Return the cached value for `key`, or run `fetch` and cache its result
  /// for `ttl`.
  ///
  /// `fetch` is only invoked by the caller that finds neither a valid entry
  /// nor a pending fetch for the key.
  pub async fn get_or_fetch<F, Fut>(
    &self,
    key: &RequestKey,
    ttl: Duration,
    fetch: F,
  ) -> Result<Lookup<V>, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
  {
    let fingerprint = key.fingerprint();

    let (inflight, source) = {
      let mut slots = self.lock();
      let existing = match slots.get(&fingerprint) {
        Some(Slot::Ready(entry)) if entry.is_valid() => Some(Ok(entry.value.clone())),
        Some(Slot::Pending(inflight)) => Some(Err(inflight.clone())),
        _ => None,
      };

      match existing {
        Some(Ok(value)) => {
          debug!(key = %key, "cache hit");
          return Ok(Lookup {
            value,
            source: CacheSource::Fresh,
          });
        }
        Some(Err(inflight)) => {
          debug!(key = %key, "joining in-flight fetch");
          (inflight, CacheSource::Joined)
        }
        None => {
          // Missing or expired: this caller leads the fetch.
          let inflight = fetch().boxed().shared();
          slots.insert(fingerprint.clone(), Slot::Pending(inflight.clone()));
          (inflight, CacheSource::Network)
        }
      }
    };

    let outcome = inflight.clone().await;
    self.settle(&fingerprint, &inflight, &outcome, ttl);
    outcome.map(|value| Lookup { value, source })
  }

  /// Replace the pending slot with the outcome. Only the first waiter to
  /// get here changes anything; the rest find the slot already settled.
  fn settle(&self, fingerprint: &str, inflight: &Inflight<V, E>, outcome: &Result<V, E>, ttl: Duration) {
    let mut slots = self.lock();
    let ours = matches!(
      slots.get(fingerprint),
      Some(Slot::Pending(current)) if current.ptr_eq(inflight)
    );
    if !ours {
      return;
    }

    match outcome {
      Ok(value) => {
        slots.insert(
          fingerprint.to_string(),
          Slot::Ready(CacheEntry::new(value.clone(), ttl)),
        );
      }
      Err(_) => {
        slots.remove(fingerprint);
      }
    }
  }

  /// Drop a cached entry. A pending fetch for the key is left alone.
  pub fn invalidate(&self, key: &RequestKey) -> bool {
    let mut slots = self.lock();
    let fingerprint = key.fingerprint();
    if matches!(slots.get(&fingerprint), Some(Slot::Ready(_))) {
      slots.remove(&fingerprint);
      true
    } else {
      false
    }
  }

  /// Remove every expired entry, returning how many were dropped.
  pub fn purge_expired(&self) -> usize {
    let mut slots = self.lock();
    let before = slots.len();
    slots.retain(|_, slot| match slot {
      Slot::Ready(entry) => entry.is_valid(),
      Slot::Pending(_) => true,
    });
    before - slots.len()
  }

  /// Number of stored entries, valid or not, excluding pending fetches.
  pub fn len(&self) -> usize {
    self
      .lock()
      .values()
      .filter(|slot| matches!(slot, Slot::Ready(_)))
      .count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot<V, E>>> {
    // Slot updates are single map operations, so a poisoned map is still
    // consistent.
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl<V, E> Default for ResponseCache<V, E>
where
  V: Clone + Send + Sync + 'static,
  E: Clone + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
