//! Access to the external JSON API.

mod client;
mod error;
mod fetcher;
mod rate_limit;
mod retry;
pub mod schema;

pub use client::{ApiClient, FetchAttempt};
pub use error::{AttemptError, FetchError, ValidationError};
pub use fetcher::{Fetcher, SharedCache, ValidatedResponse};
pub use rate_limit::RateLimiter;
pub use retry::{RetryError, RetryPolicy, Retryable};

#[cfg(test)]
pub(crate) use fetcher::tests::test_fetcher;
