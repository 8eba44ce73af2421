//! Idempotent persistence of normalized records.
//!
//! Every write goes through one pooled connection and one `IMMEDIATE`
//! transaction. Records are matched on their natural key: a missing row is
//! inserted, an existing one has exactly the supplied columns overwritten.

mod locks;
mod record;
mod schema;

pub use record::{Entity, FieldValue, NormalizedRecord};

use color_eyre::{eyre::eyre, Result};
use deadpool_sqlite::{Config as PoolConfig, InteractError, Pool, PoolError, Runtime};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use locks::KeyLocks;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
  /// This record could not be written; other records are unaffected.
  #[error("StorageError: {0}")]
  Row(String),

  /// The database itself is unusable. Continuing would fail every write.
  #[error("StorageError: connection unusable: {0}")]
  Connection(String),
}

impl StoreError {
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::Connection(_))
  }
}

impl From<rusqlite::Error> for StoreError {
  fn from(err: rusqlite::Error) -> Self {
    match err.sqlite_error_code() {
      Some(
        ErrorCode::CannotOpen
        | ErrorCode::NotADatabase
        | ErrorCode::DatabaseCorrupt
        | ErrorCode::SystemIoFailure
        | ErrorCode::DiskFull
        | ErrorCode::ReadOnly
        | ErrorCode::PermissionDenied
        | ErrorCode::OutOfMemory,
      ) => Self::Connection(err.to_string()),
      _ => Self::Row(err.to_string()),
    }
  }
}

impl From<PoolError> for StoreError {
  fn from(err: PoolError) -> Self {
    Self::Connection(err.to_string())
  }
}

impl From<InteractError> for StoreError {
  fn from(err: InteractError) -> Self {
    Self::Connection(err.to_string())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
  Inserted,
  Updated,
}

/// Totals for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
  pub inserted: usize,
  pub updated: usize,
}

impl UpsertSummary {
  fn record(&mut self, outcome: UpsertOutcome) {
    match outcome {
      UpsertOutcome::Inserted => self.inserted += 1,
      UpsertOutcome::Updated => self.updated += 1,
    }
  }
}

/// SQLite-backed record store. Cloning is cheap; clones share the pool.
#[derive(Clone)]
pub struct Store {
  pool: Pool,
  locks: Arc<KeyLocks>,
  columns: Arc<HashMap<Entity, HashSet<String>>>,
}

impl Store {
  /// Open or create the database at `path` and apply the schema.
  pub async fn open(path: &Path, pool_size: usize) -> Result<Self> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let pool = PoolConfig::new(path)
      .builder(Runtime::Tokio1)
      .map_err(|e| eyre!("Invalid database pool config: {}", e))?
      .max_size(pool_size.max(1))
      .build()
      .map_err(|e| eyre!("Failed to build database pool: {}", e))?;

    let conn = pool
      .get()
      .await
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;
    let columns = conn
      .interact(run_migrations)
      .await
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;

    info!(path = %path.display(), pool_size, "database ready");

    Ok(Self {
      pool,
      locks: Arc::new(KeyLocks::new()),
      columns: Arc::new(columns),
    })
  }

  /// Get the default database path
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("nhlstat").join("nhl.db"))
  }

  pub async fn upsert(&self, record: NormalizedRecord) -> Result<UpsertOutcome, StoreError> {
    let summary = self.upsert_batch(vec![record]).await?;
    Ok(if summary.inserted > 0 {
      UpsertOutcome::Inserted
    } else {
      UpsertOutcome::Updated
    })
  }

  /// Write `records` in a single transaction: all of them or none.
  pub async fn upsert_batch(&self, records: Vec<NormalizedRecord>) -> Result<UpsertSummary, StoreError> {
    if records.is_empty() {
      return Ok(UpsertSummary::default());
    }
    for record in &records {
      self.check_columns(record)?;
    }

    let lock_keys: Vec<String> = records.iter().map(NormalizedRecord::lock_key).collect();
    let _guards = self.locks.lock_all(lock_keys.iter().map(String::as_str)).await;

    let conn = self.pool.get().await?;
    let summary = conn
      .interact(move |conn| write_records(conn, &records))
      .await??;

    debug!(
      inserted = summary.inserted,
      updated = summary.updated,
      "batch committed"
    );
    Ok(summary)
  }

  /// Read back a row by natural key. NULL columns are left out.
  pub async fn get(&self, entity: Entity, key: Vec<FieldValue>) -> Result<Option<NormalizedRecord>, StoreError> {
    let sql = format!("SELECT * FROM {} WHERE {}", entity.table(), key_predicate(entity));
    let conn = self.pool.get().await?;
    let record = conn
      .interact(move |conn| -> Result<Option<NormalizedRecord>, rusqlite::Error> {
        let mut stmt = conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        stmt
          .query_row(params_from_iter(key.iter()), |row| {
            let mut record = NormalizedRecord::new(entity, key.iter().cloned());
            for (index, name) in names.iter().enumerate() {
              if entity.key_columns().contains(&name.as_str()) {
                continue;
              }
              match row.get_ref(index)? {
                ValueRef::Integer(v) => record.set(name, v),
                ValueRef::Real(v) => record.set(name, v),
                ValueRef::Text(v) => record.set(name, String::from_utf8_lossy(v).into_owned()),
                ValueRef::Null | ValueRef::Blob(_) => {}
              }
            }
            Ok(record)
          })
          .optional()
      })
      .await??;
    Ok(record)
  }

  pub async fn count(&self, entity: Entity) -> Result<u64, StoreError> {
    let sql = format!("SELECT COUNT(*) FROM {}", entity.table());
    let conn = self.pool.get().await?;
    let count = conn
      .interact(move |conn| conn.query_row(&sql, [], |row| row.get::<_, i64>(0)))
      .await??;
    Ok(count.max(0) as u64)
  }

  /// Close the pool; every later write fails with a connection error.
  #[cfg(test)]
  pub(crate) fn close(&self) {
    self.pool.close();
  }

  fn check_columns(&self, record: &NormalizedRecord) -> Result<(), StoreError> {
    let entity = record.entity();
    let key_columns = entity.key_columns();
    if record.key().len() != key_columns.len() {
      return Err(StoreError::Row(format!(
        "{}: expected {} key value(s), got {}",
        entity,
        key_columns.len(),
        record.key().len()
      )));
    }

    let known = self
      .columns
      .get(&entity)
      .ok_or_else(|| StoreError::Row(format!("no such table: {}", entity)))?;
    for column in record.fields().keys() {
      if key_columns.contains(&column.as_str()) {
        return Err(StoreError::Row(format!(
          "{}.{} is part of the natural key",
          entity, column
        )));
      }
      if !known.contains(column) {
        return Err(StoreError::Row(format!("no such column: {}.{}", entity, column)));
      }
    }
    Ok(())
  }
}

fn run_migrations(conn: &mut Connection) -> Result<HashMap<Entity, HashSet<String>>, rusqlite::Error> {
  conn.busy_timeout(BUSY_TIMEOUT)?;
  conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
  conn.execute_batch(schema::SCHEMA)?;

  let mut columns = HashMap::new();
  for entity in Entity::ALL {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", entity.table()))?;
    let names = stmt
      .query_map([], |row| row.get::<_, String>(1))?
      .collect::<Result<HashSet<_>, _>>()?;
    columns.insert(entity, names);
  }
  Ok(columns)
}

fn write_records(conn: &mut Connection, records: &[NormalizedRecord]) -> Result<UpsertSummary, StoreError> {
  conn.busy_timeout(BUSY_TIMEOUT)?;
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let mut summary = UpsertSummary::default();
  for record in records {
    let exists = tx
      .query_row(
        &format!(
          "SELECT 1 FROM {} WHERE {}",
          record.entity().table(),
          key_predicate(record.entity())
        ),
        params_from_iter(record.key().iter()),
        |_| Ok(()),
      )
      .optional()?
      .is_some();

    tx.execute(
      &upsert_sql(record),
      params_from_iter(record.key().iter().chain(record.fields().values())),
    )
    .map_err(|e| match StoreError::from(e) {
      StoreError::Row(reason) => StoreError::Row(format!("{} {}: {}", record.entity(), record.key_label(), reason)),
      fatal => fatal,
    })?;

    summary.record(if exists {
      UpsertOutcome::Updated
    } else {
      UpsertOutcome::Inserted
    });
  }

  tx.commit()?;
  Ok(summary)
}

/// `k1 = ?1 AND k2 = ?2` over the entity's key columns.
fn key_predicate(entity: Entity) -> String {
  entity
    .key_columns()
    .iter()
    .enumerate()
    .map(|(i, column)| format!("{} = ?{}", column, i + 1))
    .collect::<Vec<_>>()
    .join(" AND ")
}

/// Insert-or-overwrite statement binding key values first, then fields in
/// column order.
fn upsert_sql(record: &NormalizedRecord) -> String {
  let entity = record.entity();
  let key_columns = entity.key_columns();
  let columns: Vec<&str> = key_columns
    .iter()
    .copied()
    .chain(record.fields().keys().map(String::as_str))
    .collect();
  let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

  let action = if record.fields().is_empty() {
    "DO NOTHING".to_string()
  } else {
    let assignments: Vec<String> = record
      .fields()
      .keys()
      .map(|column| format!("{0} = excluded.{0}", column))
      .collect();
    format!("DO UPDATE SET {}", assignments.join(", "))
  };

  format!(
    "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
    entity.table(),
    columns.join(", "),
    placeholders.join(", "),
    key_columns.join(", "),
    action
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use futures::future::join_all;
  use tempfile::TempDir;

  async fn temp_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("nhl.db"), 4).await.unwrap();
    (dir, store)
  }

  fn game(id: i64) -> NormalizedRecord {
    NormalizedRecord::new(Entity::Game, [FieldValue::Int(id)])
  }

  #[test]
  fn test_upsert_sql() {
    let record = NormalizedRecord::new(
      Entity::Standings,
      [FieldValue::from("2024-01-15"), FieldValue::from("TOR")],
    )
    .with("wins", 25)
    .with("points", 55);
    assert_eq!(
      upsert_sql(&record),
      "INSERT INTO standings (standings_date, team_abbrev, points, wins) VALUES (?1, ?2, ?3, ?4) \
       ON CONFLICT (standings_date, team_abbrev) DO UPDATE SET points = excluded.points, wins = excluded.wins"
    );
    assert_eq!(
      upsert_sql(&game(1)),
      "INSERT INTO game (game_id) VALUES (?1) ON CONFLICT (game_id) DO NOTHING"
    );
  }

  #[tokio::test]
  async fn test_upsert_is_idempotent() {
    let (_dir, store) = temp_store().await;
    let record = game(2023020001).with("home_team", "TOR").with("away_team", "MTL");

    assert_eq!(store.upsert(record.clone()).await.unwrap(), UpsertOutcome::Inserted);
    assert_eq!(store.upsert(record.clone()).await.unwrap(), UpsertOutcome::Updated);
    assert_eq!(store.count(Entity::Game).await.unwrap(), 1);

    let stored = store
      .get(Entity::Game, vec![FieldValue::Int(2023020001)])
      .await
      .unwrap()
      .unwrap();
    assert_eq!(stored, record);
  }

  #[tokio::test]
  async fn test_update_overwrites_only_supplied_columns() {
    let (_dir, store) = temp_store().await;
    store
      .upsert(game(7).with("game_state", "LIVE").with("home_score", 1).with("away_score", 0))
      .await
      .unwrap();
    store
      .upsert(game(7).with("game_state", "OFF").with("home_score", 3))
      .await
      .unwrap();

    let stored = store.get(Entity::Game, vec![FieldValue::Int(7)]).await.unwrap().unwrap();
    assert_eq!(stored.field("game_state"), Some(&FieldValue::Text("OFF".into())));
    assert_eq!(stored.field("home_score"), Some(&FieldValue::Int(3)));
    assert_eq!(stored.field("away_score"), Some(&FieldValue::Int(0)));
    assert_eq!(stored.field("venue"), None);
  }

  #[tokio::test]
  async fn test_missing_row_reads_as_none() {
    let (_dir, store) = temp_store().await;
    assert_eq!(store.get(Entity::Game, vec![FieldValue::Int(1)]).await.unwrap(), None);
    assert_eq!(store.count(Entity::Player).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_type_mismatch_is_a_row_error() {
    let (_dir, store) = temp_store().await;
    let err = store
      .upsert(game(1).with("home_score", "three"))
      .await
      .unwrap_err();
    assert!(matches!(err, StoreError::Row(_)), "{:?}", err);
    assert!(!err.is_fatal());
    assert!(err.to_string().starts_with("StorageError: game game_id=1"));
  }

  #[tokio::test]
  async fn test_unknown_column_is_rejected() {
    let (_dir, store) = temp_store().await;
    let err = store.upsert(game(1).with("attendance", 18_000)).await.unwrap_err();
    assert_eq!(
      err,
      StoreError::Row("no such column: game.attendance".to_string())
    );

    let err = store.upsert(game(1).with("game_id", 2)).await.unwrap_err();
    assert!(matches!(err, StoreError::Row(_)));

    let err = store
      .upsert(NormalizedRecord::new(Entity::PlayerGameStats, [FieldValue::Int(1)]))
      .await
      .unwrap_err();
    assert!(matches!(err, StoreError::Row(_)));
  }

  #[tokio::test]
  async fn test_batch_is_atomic() {
    let (_dir, store) = temp_store().await;
    let err = store
      .upsert_batch(vec![
        game(1).with("home_score", 2),
        game(2).with("home_score", "two"),
      ])
      .await
      .unwrap_err();
    assert!(matches!(err, StoreError::Row(_)));
    assert_eq!(store.count(Entity::Game).await.unwrap(), 0);

    let summary = store
      .upsert_batch(vec![game(1).with("home_score", 2), game(2).with("home_score", 1)])
      .await
      .unwrap();
    assert_eq!(summary, UpsertSummary { inserted: 2, updated: 0 });
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_upserts() {
    let (_dir, store) = temp_store().await;

    let writes = (0..40).map(|i| {
      let store = store.clone();
      tokio::spawn(async move {
        store
          .upsert(
            NormalizedRecord::new(Entity::Team, [FieldValue::from(format!("T{}", i % 10))])
              .with("team_name", format!("Team {}", i)),
          )
          .await
      })
    });
    let outcomes: Vec<UpsertOutcome> = join_all(writes)
      .await
      .into_iter()
      .map(|r| r.unwrap().unwrap())
      .collect();

    assert_eq!(store.count(Entity::Team).await.unwrap(), 10);
    assert_eq!(
      outcomes.iter().filter(|o| **o == UpsertOutcome::Inserted).count(),
      10
    );
  }

  #[tokio::test]
  async fn test_closed_pool_is_a_connection_error() {
    let (_dir, store) = temp_store().await;
    store.close();

    let err = store.upsert(game(1)).await.unwrap_err();
    assert!(matches!(err, StoreError::Connection(_)), "{err:?}");
    assert!(err.is_fatal());
  }

  #[test]
  fn test_error_classification() {
    let read_only = rusqlite::Error::SqliteFailure(
      rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY),
      None,
    );
    assert!(StoreError::from(read_only).is_fatal());

    let constraint = rusqlite::Error::SqliteFailure(
      rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
      Some("NOT NULL constraint failed".into()),
    );
    assert!(!StoreError::from(constraint).is_fatal());
  }

  #[test]
  fn test_default_path() {
    if let Ok(path) = Store::default_path() {
      assert!(path.ends_with("nhlstat/nhl.db"));
    }
  }
}
