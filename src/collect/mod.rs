//! Entity-agnostic collection runs.
//!
//! A [`Source`] knows how to discover, fetch and normalize one entity type.
//! The [`Collector`] drives any source through the same loop: list, expand
//! and normalize each item, then upsert its records, recording per-item
//! failures without stopping the run.

mod scope;
mod stop;

pub use scope::Scope;
pub use stop::{StopHandle, StopSignal};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::api::schema::excerpt;
use crate::api::{FetchError, Fetcher, ValidationError};
use crate::store::{NormalizedRecord, Store, UpsertSummary};

/// One unit of work: a game, a team, a roster.
#[derive(Debug, Clone, PartialEq)]
pub struct RawItem {
  pub id: String,
  pub payload: Value,
}

impl RawItem {
  pub fn new(id: impl Into<String>, payload: Value) -> Self {
    Self {
      id: id.into(),
      payload,
    }
  }
}

/// Discovery failed; nothing in the run can proceed.
#[derive(Debug, Error)]
pub enum ListError {
  #[error(transparent)]
  Fetch(#[from] FetchError),

  #[error("ValidationError: {0}")]
  Validation(#[from] ValidationError),

  #[error("invalid scope: {0}")]
  Scope(String),
}

/// Per-entity ingestion capability.
#[allow(async_fn_in_trait)]
pub trait Source {
  /// Name used in logs and results, e.g. `"games"`
  fn entity(&self) -> &'static str;

  /// Discover the items covered by `scope`.
  async fn list(&self, fetcher: &Fetcher, scope: &Scope) -> Result<Vec<RawItem>, ListError>;

  /// Fetch per-item detail. Items arrive from `list` complete by default.
  async fn expand(&self, fetcher: &Fetcher, item: RawItem) -> Result<RawItem, FetchError> {
    let _ = fetcher;
    Ok(item)
  }

  /// Turn an item into records. An empty vector skips the item.
  fn normalize(&self, item: &RawItem) -> Result<Vec<NormalizedRecord>, ValidationError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
  pub id: String,
  pub reason: String,
}

/// Outcome of one [`Collector::collect`] run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionResult {
  pub entity: &'static str,
  pub succeeded: usize,
  pub skipped: usize,
  pub failed: Vec<ItemFailure>,
  /// Rows inserted across all succeeded items
  pub inserted: usize,
  pub updated: usize,
  /// Run-level failure that stopped the run early
  pub aborted: Option<String>,
  pub cancelled: bool,
}

impl CollectionResult {
  fn new(entity: &'static str) -> Self {
    Self {
      entity,
      succeeded: 0,
      skipped: 0,
      failed: Vec::new(),
      inserted: 0,
      updated: 0,
      aborted: None,
      cancelled: false,
    }
  }

  pub fn is_aborted(&self) -> bool {
    self.aborted.is_some()
  }

  fn absorb(&mut self, outcome: ItemOutcome) {
    match outcome {
      ItemOutcome::Stored(summary) => {
        self.succeeded += 1;
        self.inserted += summary.inserted;
        self.updated += summary.updated;
      }
      ItemOutcome::Skipped => self.skipped += 1,
      ItemOutcome::Failed(failure) => self.failed.push(failure),
      ItemOutcome::Aborted(reason) => {
        if self.aborted.is_none() {
          error!(entity = self.entity, %reason, "run aborted");
          self.aborted = Some(reason);
        } else {
          self.skipped += 1;
        }
      }
      ItemOutcome::Cancelled => {
        self.cancelled = true;
        self.skipped += 1;
      }
    }
  }
}

impl fmt::Display for CollectionResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}: {} succeeded, {} skipped, {} failed ({} inserted, {} updated)",
      self.entity,
      self.succeeded,
      self.skipped,
      self.failed.len(),
      self.inserted,
      self.updated
    )?;
    if let Some(reason) = &self.aborted {
      write!(f, "; aborted: {}", reason)?;
    }
    if self.cancelled {
      f.write_str("; cancelled")?;
    }
    for failure in &self.failed {
      write!(f, "\n  {}: {}", failure.id, failure.reason)?;
    }
    Ok(())
  }
}

enum ItemOutcome {
  Stored(UpsertSummary),
  Skipped,
  Failed(ItemFailure),
  Aborted(String),
  Cancelled,
}

/// Runs a [`Source`] against the shared fetcher and store.
pub struct Collector<S> {
  source: S,
  fetcher: Fetcher,
  store: Store,
  concurrency: usize,
}

impl<S: Source> Collector<S> {
  pub fn new(source: S, fetcher: Fetcher, store: Store) -> Self {
    Self {
      source,
      fetcher,
      store,
      concurrency: 8,
    }
  }

  /// Items processed at once; at least one.
  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  /// Collect everything `scope` covers.
  ///
  /// `stop` is polled before each item starts; items already in flight
  /// finish. A fatal fetch or connection-level storage error aborts the
  /// run: items not yet started are counted as skipped.
  pub async fn collect(&self, scope: &Scope, stop: &StopSignal) -> CollectionResult {
    let entity = self.source.entity();
    let mut result = CollectionResult::new(entity);

    if stop.is_stopped() {
      result.cancelled = true;
      return result;
    }

    let items = match self.source.list(&self.fetcher, scope).await {
      Ok(items) => items,
      Err(e) => {
        error!(entity, error = %e, "listing failed");
        result.aborted = Some(e.to_string());
        return result;
      }
    };
    info!(entity, items = items.len(), "collection started");

    let halted = &AtomicBool::new(false);
    let mut outcomes = stream::iter(items)
      .map(move |item| async move {
        if halted.load(Ordering::SeqCst) {
          return ItemOutcome::Skipped;
        }
        if stop.is_stopped() {
          return ItemOutcome::Cancelled;
        }
        let outcome = self.process(item).await;
        if matches!(outcome, ItemOutcome::Aborted(_)) {
          halted.store(true, Ordering::SeqCst);
        }
        outcome
      })
      .buffer_unordered(self.concurrency);

    while let Some(outcome) = outcomes.next().await {
      result.absorb(outcome);
    }

    info!(
      entity,
      succeeded = result.succeeded,
      skipped = result.skipped,
      failed = result.failed.len(),
      inserted = result.inserted,
      updated = result.updated,
      cancelled = result.cancelled,
      "collection finished"
    );
    result
  }

  async fn process(&self, item: RawItem) -> ItemOutcome {
    let entity = self.source.entity();
    let id = item.id.clone();

    let item = match self.source.expand(&self.fetcher, item).await {
      Ok(item) => item,
      Err(e) if e.is_fatal() => return ItemOutcome::Aborted(e.to_string()),
      Err(e) => {
        warn!(entity, item = %id, error = %e, "fetch failed");
        return ItemOutcome::Failed(ItemFailure {
          id,
          reason: e.to_string(),
        });
      }
    };

    let records = match self.source.normalize(&item) {
      Ok(records) => records,
      Err(e) => {
        warn!(
          entity,
          item = %id,
          error = %e,
          payload = %excerpt(&item.payload, 512),
          "item failed validation"
        );
        return ItemOutcome::Failed(ItemFailure {
          id,
          reason: format!("ValidationError: {}", e),
        });
      }
    };
    if records.is_empty() {
      debug!(entity, item = %id, "nothing to store");
      return ItemOutcome::Skipped;
    }

    match self.store.upsert_batch(records).await {
      Ok(summary) => ItemOutcome::Stored(summary),
      Err(e) if e.is_fatal() => ItemOutcome::Aborted(e.to_string()),
      Err(e) => {
        warn!(entity, item = %id, error = %e, "upsert failed");
        ItemOutcome::Failed(ItemFailure {
          id,
          reason: e.to_string(),
        })
      }
    }
  }
}
