//! Cached, paced and retried access to API endpoints.

use color_eyre::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{CacheSource, RequestKey, ResponseCache};
use crate::config::{CacheConfig, Config};
use crate::nhl::Endpoint;

use super::client::ApiClient;
use super::error::FetchError;
use super::rate_limit::RateLimiter;
use super::retry::RetryPolicy;
use super::schema::{excerpt, Schema};

/// Response cache shared by every fetcher in the process.
pub type SharedCache = Arc<ResponseCache<Arc<Value>, FetchError>>;

/// A payload that passed its endpoint's schema check.
#[derive(Debug, Clone)]
pub struct ValidatedResponse {
  pub key: RequestKey,
  pub body: Arc<Value>,
  pub source: CacheSource,
}

/// Endpoint access composed from the shared cache, the shared rate limiter
/// and a retry policy.
///
/// Cloning is cheap; clones share the cache and limiter.
#[derive(Clone)]
pub struct Fetcher {
  client: ApiClient,
  cache: SharedCache,
  limiter: Arc<RateLimiter>,
  retry: RetryPolicy,
  ttls: CacheConfig,
}

impl Fetcher {
  pub fn new(
    client: ApiClient,
    cache: SharedCache,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
    ttls: CacheConfig,
  ) -> Self {
    Self {
      client,
      cache,
      limiter,
      retry,
      ttls,
    }
  }

  /// Build a fetcher with a fresh cache and limiter from configuration.
  pub fn from_config(config: &Config) -> Result<Self> {
    Ok(Self::new(
      ApiClient::new(&config.api)?,
      Arc::new(ResponseCache::new()),
      Arc::new(config.rate_limit.limiter()),
      config.retry.policy(),
      config.cache.clone(),
    ))
  }

  pub fn cache(&self) -> &SharedCache {
    &self.cache
  }

  /// Fetch a catalogued endpoint with its configured TTL.
  pub async fn fetch(&self, endpoint: &Endpoint) -> Result<ValidatedResponse, FetchError> {
    let ttl = self.ttls.ttl_for(endpoint.kind());
    self.request(endpoint.key(), endpoint.schema(), ttl).await
  }

  /// Fetch `key`, serving from cache while an entry younger than `ttl`
  /// exists.
  ///
  /// On a miss the request waits for the rate limiter, runs under the retry
  /// policy and is checked against `schema`. Only validated payloads reach
  /// the cache.
  pub async fn request(
    &self,
    key: RequestKey,
    schema: &'static Schema,
    ttl: Duration,
  ) -> Result<ValidatedResponse, FetchError> {
    let client = self.client.clone();
    let limiter = Arc::clone(&self.limiter);
    let retry = self.retry.clone();
    let fetch_key = key.clone();

    let lookup = self
      .cache
      .get_or_fetch(&key, ttl, move || async move {
        let path = fetch_key.path().to_string();
        let url = client.url_for(&fetch_key).map_err(|e| FetchError::Client {
          path: path.clone(),
          status: None,
          reason: format!("invalid request URL: {}", e),
        })?;

        let (client, limiter, url) = (&client, &limiter, &url);
        let payload = retry
          .run(move |attempt| {
            let url = url.clone();
            async move {
              limiter.acquire().await;
              client.get(url, attempt).await
            }
          })
          .await
          .map_err(|e| FetchError::from_retry(&path, e))?;

        if let Err(error) = schema.validate(&payload) {
          warn!(
            key = %fetch_key,
            schema = schema.name,
            %error,
            payload = %excerpt(&payload, 512),
            "response failed validation"
          );
          return Err(FetchError::Validation { path, error });
        }

        Ok(Arc::new(payload))
      })
      .await?;

    match lookup.source {
      CacheSource::Network => info!(key = %key, fingerprint = %key.short_fingerprint(), "fetched"),
      source => debug!(key = %key, ?source, "served from cache"),
    }

    Ok(ValidatedResponse {
      key,
      body: lookup.value,
      source: lookup.source,
    })
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::api::schema::{FieldRule, JsonKind};
  use crate::config::ApiConfig;
  use futures::future::join_all;
  use serde_json::json;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  /// Fetcher against `base_url` with fast retries and no pacing.
  pub(crate) fn test_fetcher(base_url: &str) -> Fetcher {
    let client = ApiClient::new(&ApiConfig {
      base_url: base_url.to_string(),
      timeout_secs: 5,
      ..ApiConfig::default()
    })
    .unwrap();
    Fetcher::new(
      client,
      Arc::new(ResponseCache::new()),
      Arc::new(RateLimiter::unlimited()),
      RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(20)),
      CacheConfig::default(),
    )
  }

  const TEAMS: Schema = Schema {
    name: "teams",
    required: &[FieldRule::new("teams", JsonKind::Array)],
  };

  const TTL: Duration = Duration::from_secs(60);

  #[tokio::test]
  async fn test_second_request_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/teams"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"teams": []})))
      .expect(1)
      .mount(&server)
      .await;

    let fetcher = test_fetcher(&server.uri());
    let first = fetcher.request(RequestKey::new("teams"), &TEAMS, TTL).await.unwrap();
    let second = fetcher.request(RequestKey::new("teams"), &TEAMS, TTL).await.unwrap();

    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(second.source, CacheSource::Fresh);
    assert_eq!(*second.body, json!({"teams": []}));
  }

  #[tokio::test]
  async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(path("/teams"))
      .respond_with(ResponseTemplate::new(404))
      .expect(1)
      .mount(&server)
      .await;

    let fetcher = test_fetcher(&server.uri());
    let err = fetcher
      .request(RequestKey::new("teams"), &TEAMS, TTL)
      .await
      .unwrap_err();

    assert!(matches!(err, FetchError::Client { status: Some(404), .. }));
    assert!(!err.is_fatal());
  }

  #[tokio::test]
  async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(path("/teams"))
      .respond_with(ResponseTemplate::new(503))
      .expect(3)
      .mount(&server)
      .await;

    let fetcher = test_fetcher(&server.uri());
    let err = fetcher
      .request(RequestKey::new("teams"), &TEAMS, TTL)
      .await
      .unwrap_err();

    assert!(matches!(err, FetchError::Network { attempts: 3, .. }));
    assert!(err.is_fatal());
    assert!(fetcher.cache().is_empty());
  }

  #[tokio::test]
  async fn test_transient_failure_then_success() {
    let server = MockServer::start().await;
    Mock::given(path("/teams"))
      .respond_with(ResponseTemplate::new(502))
      .up_to_n_times(2)
      .expect(2)
      .mount(&server)
      .await;
    Mock::given(path("/teams"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"teams": [1]})))
      .expect(1)
      .mount(&server)
      .await;

    let fetcher = test_fetcher(&server.uri());
    let response = fetcher
      .request(RequestKey::new("teams"), &TEAMS, TTL)
      .await
      .unwrap();
    assert_eq!(*response.body, json!({"teams": [1]}));
  }

  #[tokio::test]
  async fn test_invalid_payload_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(path("/teams"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"clubs": []})))
      .expect(2)
      .mount(&server)
      .await;

    let fetcher = test_fetcher(&server.uri());
    for _ in 0..2 {
      let err = fetcher
        .request(RequestKey::new("teams"), &TEAMS, TTL)
        .await
        .unwrap_err();
      assert_eq!(err.to_string(), "ValidationError: missing field teams");
    }
    assert!(fetcher.cache().is_empty());
  }

  #[tokio::test]
  async fn test_concurrent_requests_share_one_call() {
    let server = MockServer::start().await;
    Mock::given(path("/teams"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(json!({"teams": []}))
          .set_delay(Duration::from_millis(200)),
      )
      .expect(1)
      .mount(&server)
      .await;

    let fetcher = test_fetcher(&server.uri());
    let responses = join_all(
      (0..8).map(|_| fetcher.request(RequestKey::new("teams"), &TEAMS, TTL)),
    )
    .await;

    let sources: Vec<CacheSource> = responses
      .into_iter()
      .map(|r| r.unwrap().source)
      .collect();
    assert_eq!(
      sources.iter().filter(|s| **s == CacheSource::Network).count(),
      1
    );
    assert_eq!(
      sources.iter().filter(|s| **s == CacheSource::Joined).count(),
      7
    );
  }

  #[tokio::test]
  async fn test_catalogued_endpoint_uses_its_schema() {
    let server = MockServer::start().await;
    Mock::given(path("/standings/now"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"standings": []})))
      .mount(&server)
      .await;

    let fetcher = test_fetcher(&server.uri());
    let response = fetcher
      .fetch(&Endpoint::Standings { date: None })
      .await
      .unwrap();
    assert_eq!(response.key, RequestKey::new("standings/now"));
  }
}
