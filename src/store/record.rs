//! Normalized records: what collectors produce and the store persists.

use rusqlite::types::{ToSql, ToSqlOutput};
use std::collections::BTreeMap;
use std::fmt;

/// Persisted entity types, one table each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {
  Team,
  Player,
  Game,
  PlayerGameStats,
  Standings,
}

impl Entity {
  pub const ALL: [Entity; 5] = [
    Entity::Team,
    Entity::Player,
    Entity::Game,
    Entity::PlayerGameStats,
    Entity::Standings,
  ];

  pub fn table(self) -> &'static str {
    match self {
      Entity::Team => "team",
      Entity::Player => "player",
      Entity::Game => "game",
      Entity::PlayerGameStats => "player_game_stats",
      Entity::Standings => "standings",
    }
  }

  /// Columns forming the natural key, in key order.
  pub fn key_columns(self) -> &'static [&'static str] {
    match self {
      Entity::Team => &["team_abbrev"],
      Entity::Player => &["player_id"],
      Entity::Game => &["game_id"],
      Entity::PlayerGameStats => &["player_id", "game_id"],
      Entity::Standings => &["standings_date", "team_abbrev"],
    }
  }
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.table())
  }
}

/// A typed column value. There is no null: unknown values are left out of
/// the record so they never overwrite stored data.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
  Int(i64),
  Real(f64),
  Text(String),
}

impl fmt::Display for FieldValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FieldValue::Int(v) => write!(f, "{}", v),
      FieldValue::Real(v) => write!(f, "{}", v),
      FieldValue::Text(v) => f.write_str(v),
    }
  }
}

impl From<i64> for FieldValue {
  fn from(v: i64) -> Self {
    FieldValue::Int(v)
  }
}

impl From<i32> for FieldValue {
  fn from(v: i32) -> Self {
    FieldValue::Int(v.into())
  }
}

impl From<u32> for FieldValue {
  fn from(v: u32) -> Self {
    FieldValue::Int(v.into())
  }
}

impl From<f64> for FieldValue {
  fn from(v: f64) -> Self {
    FieldValue::Real(v)
  }
}

impl From<String> for FieldValue {
  fn from(v: String) -> Self {
    FieldValue::Text(v)
  }
}

impl From<&str> for FieldValue {
  fn from(v: &str) -> Self {
    FieldValue::Text(v.to_string())
  }
}

impl ToSql for FieldValue {
  fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
    Ok(match self {
      FieldValue::Int(v) => ToSqlOutput::from(*v),
      FieldValue::Real(v) => ToSqlOutput::from(*v),
      FieldValue::Text(v) => ToSqlOutput::from(v.as_str()),
    })
  }
}

/// One row-to-be: entity, natural key and the non-key columns known from
/// the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
  entity: Entity,
  key: Vec<FieldValue>,
  fields: BTreeMap<String, FieldValue>,
}

impl NormalizedRecord {
  /// `key` holds one value per [`Entity::key_columns`] entry, in order.
  pub fn new(entity: Entity, key: impl IntoIterator<Item = FieldValue>) -> Self {
    Self {
      entity,
      key: key.into_iter().collect(),
      fields: BTreeMap::new(),
    }
  }

  pub fn with(mut self, column: &str, value: impl Into<FieldValue>) -> Self {
    self.set(column, value);
    self
  }

  /// Set `column` only when the payload had a value for it.
  pub fn with_opt<V: Into<FieldValue>>(mut self, column: &str, value: Option<V>) -> Self {
    if let Some(value) = value {
      self.set(column, value);
    }
    self
  }

  pub fn set(&mut self, column: &str, value: impl Into<FieldValue>) {
    self.fields.insert(column.to_string(), value.into());
  }

  pub fn entity(&self) -> Entity {
    self.entity
  }

  pub fn key(&self) -> &[FieldValue] {
    &self.key
  }

  pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
    &self.fields
  }

  pub fn field(&self, column: &str) -> Option<&FieldValue> {
    self.fields.get(column)
  }

  /// `column=value` pairs of the natural key, e.g. `player_id=8478402/game_id=2023020001`.
  pub fn key_label(&self) -> String {
    self
      .entity
      .key_columns()
      .iter()
      .zip(&self.key)
      .map(|(column, value)| format!("{}={}", column, value))
      .collect::<Vec<_>>()
      .join("/")
  }

  /// Identity used to serialize writers of the same row.
  pub(crate) fn lock_key(&self) -> String {
    format!("{}:{}", self.entity.table(), self.key_label())
  }
}
