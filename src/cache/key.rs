//! Request keys and their fingerprints.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of one API request: endpoint path plus query parameters.
///
/// Parameters live in a `BTreeMap`, so insertion order never affects
/// equality or the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
  path: String,
  params: BTreeMap<String, String>,
}

impl RequestKey {
  /// Create a key for `path` with no parameters.
  ///
  /// Leading and trailing slashes are dropped so `"/standings/now"` and
  /// `"standings/now"` name the same request.
  pub fn new(path: impl Into<String>) -> Self {
    let path = path.into();
    Self {
      path: path.trim_matches('/').to_string(),
      params: BTreeMap::new(),
    }
  }

  /// Add (or replace) a query parameter.
  pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.params.insert(name.into(), value.into());
    self
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn params(&self) -> &BTreeMap<String, String> {
    &self.params
  }

  /// Stable SHA-256 hex digest of the key.
  ///
  /// Every component is length-prefixed, so `{"a=b": "c"}` and `{"a": "b=c"}`
  /// never collide.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    feed(&mut hasher, &self.path);
    for (name, value) in &self.params {
      feed(&mut hasher, name);
      feed(&mut hasher, value);
    }
    hex::encode(hasher.finalize())
  }

  /// First 12 hex digits of the fingerprint, for log lines.
  pub fn short_fingerprint(&self) -> String {
    let mut fingerprint = self.fingerprint();
    fingerprint.truncate(12);
    fingerprint
  }
}

fn feed(hasher: &mut Sha256, part: &str) {
  hasher.update((part.len() as u64).to_be_bytes());
  hasher.update(part.as_bytes());
}

impl fmt::Display for RequestKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.path)?;
    for (i, (name, value)) in self.params.iter().enumerate() {
      let sep = if i == 0 { '?' } else { '&' };
      write!(f, "{}{}={}", sep, name, value)?;
    }
    Ok(())
  }
}
