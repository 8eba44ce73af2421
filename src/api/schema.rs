//! Response-shape checks applied before a payload is cached.

use serde_json::Value;

use super::error::ValidationError;

/// JSON type expected at a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
  Object,
  Array,
  String,
  Integer,
  Number,
}

impl JsonKind {
  fn matches(self, value: &Value) -> bool {
    match self {
      Self::Object => value.is_object(),
      Self::Array => value.is_array(),
      Self::String => value.is_string(),
      Self::Integer => value.is_i64() || value.is_u64(),
      Self::Number => value.is_number(),
    }
  }

  fn name(self) -> &'static str {
    match self {
      Self::Object => "object",
      Self::Array => "array",
      Self::String => "string",
      Self::Integer => "integer",
      Self::Number => "number",
    }
  }
}

/// Name of the JSON type of `value`, for error messages.
pub fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(n) if n.is_f64() => "number",
    Value::Number(_) => "integer",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

/// A required field, addressed by a dotted path from the payload root.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
  pub path: &'static str,
  pub kind: JsonKind,
}

impl FieldRule {
  pub const fn new(path: &'static str, kind: JsonKind) -> Self {
    Self { path, kind }
  }
}

/// Top-level shape an endpoint promises.
#[derive(Debug)]
pub struct Schema {
  pub name: &'static str,
  pub required: &'static [FieldRule],
}

impl Schema {
  /// Accepts any JSON object.
  pub const OBJECT: Schema = Schema {
    name: "object",
    required: &[],
  };

  pub fn validate(&self, payload: &Value) -> Result<(), ValidationError> {
    if !payload.is_object() {
      return Err(ValidationError::WrongType {
        field: "$".to_string(),
        expected: "object",
        found: kind_of(payload),
      });
    }

    for rule in self.required {
      let value = lookup(payload, rule.path)
        .filter(|v| !v.is_null())
        .ok_or_else(|| ValidationError::MissingField(rule.path.to_string()))?;
      if !rule.kind.matches(value) {
        return Err(ValidationError::WrongType {
          field: rule.path.to_string(),
          expected: rule.kind.name(),
          found: kind_of(value),
        });
      }
    }
    Ok(())
  }
}

/// Follow a dotted path (`"homeTeam.abbrev"`) through nested objects.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
  path
    .split('.')
    .try_fold(value, |current, segment| current.get(segment))
}

/// Render at most `limit` characters of a payload for log lines.
pub fn excerpt(value: &Value, limit: usize) -> String {
  let rendered = value.to_string();
  match rendered.char_indices().nth(limit) {
    Some((cut, _)) => format!("{}...", &rendered[..cut]),
    None => rendered,
  }
}
