use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use crate::cache::RequestKey;
use crate::config::ApiConfig;

use super::error::AttemptError;

/// One HTTP round trip, logged and then discarded.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
  pub attempt: u32,
  pub status: Option<u16>,
  pub latency: Duration,
  pub ok: bool,
}

/// Thin HTTP client for the JSON API: one GET, one classified result.
///
/// Retries, pacing and caching are layered on top by the fetcher.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    // Url::join drops the last path segment unless the base ends in '/'.
    let base = if config.base_url.ends_with('/') {
      config.base_url.clone()
    } else {
      format!("{}/", config.base_url)
    };
    let base_url =
      Url::parse(&base).map_err(|e| eyre!("Invalid API base URL {}: {}", config.base_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(config.user_agent.clone())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  /// Absolute URL for a request key.
  pub fn url_for(&self, key: &RequestKey) -> Result<Url, url::ParseError> {
    let mut url = self.base_url.join(key.path())?;
    if !key.params().is_empty() {
      url.query_pairs_mut().extend_pairs(key.params());
    }
    Ok(url)
  }

  /// Perform a single GET and decode the body as JSON.
  pub async fn get(&self, url: Url, attempt: u32) -> Result<Value, AttemptError> {
    let started = Instant::now();
    let result = self.get_inner(url.clone()).await;

    let record = FetchAttempt {
      attempt,
      status: match &result {
        Ok((status, _)) => Some(*status),
        Err(AttemptError::Server(s)) | Err(AttemptError::Client(s)) => Some(*s),
        Err(AttemptError::Throttled) => Some(429),
        Err(_) => None,
      },
      latency: started.elapsed(),
      ok: result.is_ok(),
    };
    debug!(
      url = %url,
      attempt = record.attempt,
      status = ?record.status,
      latency_ms = record.latency.as_millis() as u64,
      ok = record.ok,
      "http attempt"
    );

    result.map(|(_, body)| body)
  }

  async fn get_inner(&self, url: Url) -> Result<(u16, Value), AttemptError> {
    let response = self.http.get(url).send().await.map_err(classify)?;

    let status = response.status();
    if status.as_u16() == 429 {
      return Err(AttemptError::Throttled);
    }
    if status.is_server_error() {
      return Err(AttemptError::Server(status.as_u16()));
    }
    if !status.is_success() {
      return Err(AttemptError::Client(status.as_u16()));
    }

    let body = response.bytes().await.map_err(|e| {
      if e.is_timeout() {
        AttemptError::Timeout
      } else {
        AttemptError::Body(e.to_string())
      }
    })?;

    let payload =
      serde_json::from_slice(&body).map_err(|e| AttemptError::Decode(e.to_string()))?;
    Ok((status.as_u16(), payload))
  }
}

fn classify(err: reqwest::Error) -> AttemptError {
  if err.is_timeout() {
    AttemptError::Timeout
  } else {
    AttemptError::Connect(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client(base_url: &str) -> ApiClient {
    ApiClient::new(&ApiConfig {
      base_url: base_url.to_string(),
      timeout_secs: 5,
      ..ApiConfig::default()
    })
    .unwrap()
  }

  #[test]
  fn test_url_for_keeps_base_path() {
    let client = client("https://api-web.nhle.com/v1");
    let url = client
      .url_for(&RequestKey::new("standings/now").param("lang", "en"))
      .unwrap();
    assert_eq!(url.as_str(), "https://api-web.nhle.com/v1/standings/now?lang=en");

    let url = client
      .url_for(&RequestKey::new("/roster/TOR/20232024"))
      .unwrap();
    assert_eq!(url.as_str(), "https://api-web.nhle.com/v1/roster/TOR/20232024");
  }

  #[tokio::test]
  async fn test_status_classification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/ok"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"a": 1})))
      .mount(&server)
      .await;
    Mock::given(path("/missing"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;
    Mock::given(path("/down"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;
    Mock::given(path("/slow-down"))
      .respond_with(ResponseTemplate::new(429))
      .mount(&server)
      .await;
    Mock::given(path("/garbage"))
      .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
      .mount(&server)
      .await;

    let client = client(&server.uri());
    let get = |p: &str| {
      let url = client.url_for(&RequestKey::new(p)).unwrap();
      client.get(url, 1)
    };

    assert_eq!(get("ok").await, Ok(serde_json::json!({"a": 1})));
    assert_eq!(get("missing").await, Err(AttemptError::Client(404)));
    assert_eq!(get("down").await, Err(AttemptError::Server(503)));
    assert_eq!(get("slow-down").await, Err(AttemptError::Throttled));
    assert!(matches!(get("garbage").await, Err(AttemptError::Decode(_))));
  }

  #[tokio::test]
  async fn test_connection_refused_is_retryable() {
    use crate::api::retry::Retryable;

    // Nothing listens on the discard port.
    let client = client("http://127.0.0.1:9");
    let url = client.url_for(&RequestKey::new("x")).unwrap();
    let err = client.get(url, 1).await.unwrap_err();
    assert!(err.is_retryable());
  }
}
