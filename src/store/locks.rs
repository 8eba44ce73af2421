use std::collections::HashMap;
use std::sync::{Arc, Mutex as SyncMutex, MutexGuard as SyncMutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async locks keyed by row identity.
///
/// Writers of the same row share one lock; writers of different rows never
/// wait on each other, so there is no store-wide write lock. A key's lock
/// lives only while someone holds or awaits it.
#[derive(Default)]
pub struct KeyLocks {
  locks: SyncMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyLocks {
  pub fn new() -> Self {
    Self::default()
  }

  /// Lock every key in `keys`. Keys are taken in sorted order, so
  /// overlapping batches cannot deadlock.
  pub async fn lock_all<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Vec<OwnedMutexGuard<()>> {
    let mut keys: Vec<&str> = keys.into_iter().collect();
    keys.sort_unstable();
    keys.dedup();

    let mutexes: Vec<Arc<Mutex<()>>> = {
      let mut locks = self.map();
      // Only the map refers to an idle lock.
      locks.retain(|_, lock| Arc::strong_count(lock) > 1);
      keys
        .iter()
        .map(|key| Arc::clone(locks.entry((*key).to_string()).or_default()))
        .collect()
    };

    let mut guards = Vec::with_capacity(mutexes.len());
    for mutex in mutexes {
      guards.push(mutex.lock_owned().await);
    }
    guards
  }

  #[cfg(test)]
  fn tracked(&self) -> usize {
    self.map().len()
  }

  fn map(&self) -> SyncMutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
    self.locks.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test(start_paused = true)]
  async fn test_same_key_is_serialized() {
    let locks = Arc::new(KeyLocks::new());
    let guards = locks.lock_all(["team:team_abbrev=TOR"]).await;

    let waiter = {
      let locks = Arc::clone(&locks);
      tokio::spawn(async move {
        let _guards = locks.lock_all(["team:team_abbrev=TOR"]).await;
      })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!waiter.is_finished());

    drop(guards);
    waiter.await.unwrap();
  }

  #[tokio::test(start_paused = true)]
  async fn test_large_batches_of_different_keys_do_not_wait() {
    let locks = Arc::new(KeyLocks::new());
    let first: Vec<String> = (0..40)
      .map(|player| format!("player_game_stats:player_id={}/game_id=1", player))
      .collect();
    let second: Vec<String> = (0..40)
      .map(|player| format!("player_game_stats:player_id={}/game_id=2", player))
      .collect();

    let _held = locks.lock_all(first.iter().map(String::as_str)).await;
    let other = tokio::time::timeout(
      Duration::from_millis(10),
      locks.lock_all(second.iter().map(String::as_str)),
    )
    .await;

    assert_eq!(other.map(|guards| guards.len()).ok(), Some(40));
  }

  #[tokio::test]
  async fn test_duplicate_keys_take_one_guard() {
    let locks = KeyLocks::new();
    let guards = locks.lock_all(["a", "a", "a"]).await;
    assert_eq!(guards.len(), 1);
  }

  #[tokio::test]
  async fn test_idle_keys_are_dropped() {
    let locks = KeyLocks::new();
    drop(locks.lock_all(["a", "b"]).await);
    assert_eq!(locks.tracked(), 2);

    let _held = locks.lock_all(["c"]).await;
    assert_eq!(locks.tracked(), 1);
  }
}
