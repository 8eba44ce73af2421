//! Error taxonomy for API access.

use thiserror::Error;

use super::retry::{RetryError, Retryable};

/// A payload did not have the shape its endpoint promises.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
  #[error("missing field {0}")]
  MissingField(String),

  #[error("field {field}: expected {expected}, found {found}")]
  WrongType {
    field: String,
    expected: &'static str,
    found: &'static str,
  },

  #[error("{0}")]
  Malformed(String),
}

impl From<serde_json::Error> for ValidationError {
  fn from(err: serde_json::Error) -> Self {
    Self::Malformed(err.to_string())
  }
}

/// Failure of a single HTTP round trip, before any retry decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
  #[error("request timed out")]
  Timeout,

  #[error("connection failed: {0}")]
  Connect(String),

  #[error("server error: HTTP {0}")]
  Server(u16),

  #[error("throttled by server: HTTP 429")]
  Throttled,

  #[error("failed to read response body: {0}")]
  Body(String),

  #[error("client error: HTTP {0}")]
  Client(u16),

  #[error("response is not valid JSON: {0}")]
  Decode(String),
}

impl Retryable for AttemptError {
  fn is_retryable(&self) -> bool {
    match self {
      Self::Timeout | Self::Connect(_) | Self::Server(_) | Self::Throttled | Self::Body(_) => true,
      Self::Client(_) | Self::Decode(_) => false,
    }
  }
}

/// What a [`Fetcher`](super::Fetcher) caller sees.
///
/// The three variants call for different reactions: network errors mean
/// the API is unreachable, client errors mean the request itself is wrong,
/// and validation errors mean this one payload is unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  #[error("NetworkError: {message} (after {attempts} attempt(s))")]
  Network { attempts: u32, message: String },

  #[error("ClientError: {reason} ({path})")]
  Client {
    path: String,
    status: Option<u16>,
    reason: String,
  },

  #[error("ValidationError: {error}")]
  Validation { path: String, error: ValidationError },
}

impl FetchError {
  pub(crate) fn from_retry(path: &str, err: RetryError<AttemptError>) -> Self {
    match err {
      RetryError::Exhausted { attempts, last } => Self::Network {
        attempts,
        message: last.to_string(),
      },
      RetryError::Terminal(AttemptError::Client(status)) => Self::Client {
        path: path.to_string(),
        status: Some(status),
        reason: format!("HTTP {}", status),
      },
      RetryError::Terminal(AttemptError::Decode(message)) => Self::Validation {
        path: path.to_string(),
        error: ValidationError::Malformed(format!("response is not valid JSON: {}", message)),
      },
      RetryError::Terminal(other) => Self::Network {
        attempts: 1,
        message: other.to_string(),
      },
    }
  }

  /// Whether this error should stop a whole collection run rather than a
  /// single item: the API is down, or our credentials are refused.
  /// Throttling (HTTP 429) is retried and surfaces as an exhausted
  /// `Network` error.
  pub fn is_fatal(&self) -> bool {
    match self {
      Self::Network { .. } => true,
      Self::Client { status, .. } => matches!(status, Some(401) | Some(403)),
      Self::Validation { .. } => false,
    }
  }
}
