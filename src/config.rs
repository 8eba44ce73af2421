use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::{RateLimiter, RetryPolicy};
use crate::nhl::EndpointKind;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub api: ApiConfig,
  pub rate_limit: RateLimitConfig,
  pub retry: RetryConfig,
  pub cache: CacheConfig,
  pub database: DatabaseConfig,
  pub collect: CollectConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  /// Whole-request timeout, connect through body
  pub timeout_secs: u64,
  pub user_agent: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api-web.nhle.com/v1/".to_string(),
      timeout_secs: 30,
      user_agent: format!("nhlstat/{}", env!("CARGO_PKG_VERSION")),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
  /// Requests allowed per window; 0 disables pacing
  pub max_requests: u32,
  pub window_secs: u64,
}

impl Default for RateLimitConfig {
  fn default() -> Self {
    Self {
      max_requests: 5,
      window_secs: 1,
    }
  }
}

impl RateLimitConfig {
  pub fn limiter(&self) -> RateLimiter {
    match NonZeroU32::new(self.max_requests) {
      Some(max) => RateLimiter::new(max, Duration::from_secs(self.window_secs)),
      None => RateLimiter::unlimited(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
  pub max_attempts: u32,
  pub base_delay_ms: u64,
  pub max_delay_ms: u64,
  pub jitter_ms: u64,
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_attempts: 3,
      base_delay_ms: 500,
      max_delay_ms: 10_000,
      jitter_ms: 250,
    }
  }
}

impl RetryConfig {
  pub fn policy(&self) -> RetryPolicy {
    RetryPolicy::new(
      self.max_attempts,
      Duration::from_millis(self.base_delay_ms),
      Duration::from_millis(self.max_delay_ms),
    )
    .with_jitter(Duration::from_millis(self.jitter_ms))
  }
}

/// Per-endpoint response TTLs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub standings_ttl_secs: u64,
  pub roster_ttl_secs: u64,
  pub schedule_ttl_secs: u64,
  /// Short, since live games change by the minute
  pub boxscore_ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      standings_ttl_secs: 3_600,
      roster_ttl_secs: 86_400,
      schedule_ttl_secs: 300,
      boxscore_ttl_secs: 60,
    }
  }
}

impl CacheConfig {
  pub fn ttl_for(&self, kind: EndpointKind) -> Duration {
    let secs = match kind {
      EndpointKind::Standings => self.standings_ttl_secs,
      EndpointKind::Roster => self.roster_ttl_secs,
      EndpointKind::Schedule => self.schedule_ttl_secs,
      EndpointKind::Boxscore => self.boxscore_ttl_secs,
    };
    Duration::from_secs(secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
  /// SQLite file; defaults to the platform data directory
  pub path: Option<PathBuf>,
  pub pool_size: usize,
}

impl Default for DatabaseConfig {
  fn default() -> Self {
    Self {
      path: None,
      pool_size: 4,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectConfig {
  /// Items processed at once within one collection run
  pub concurrency: usize,
}

impl Default for CollectConfig {
  fn default() -> Self {
    Self { concurrency: 8 }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./nhlstat.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/nhlstat/config.yaml
  ///
  /// Without a file every setting takes its default.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    Ok(config.with_overrides(|name| std::env::var(name).ok()))
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("nhlstat.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("nhlstat").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Apply environment overrides.
  ///
  /// Checks NHLSTAT_API_URL for the API base URL and NHLSTAT_DB for the
  /// database path.
  pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
    if let Some(url) = var("NHLSTAT_API_URL") {
      self.api.base_url = url;
    }
    if let Some(path) = var("NHLSTAT_DB") {
      self.database.path = Some(PathBuf::from(path));
    }
    self
  }
}
