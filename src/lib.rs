//! Collection core for NHL statistics.
//!
//! Requests to the NHL web API go through a [`api::Fetcher`], which layers a
//! single-flight response cache, a shared rate limiter and a retry policy
//! over a plain HTTP client. Entity sources in [`nhl`] turn payloads into
//! [`store::NormalizedRecord`]s, and a [`collect::Collector`] upserts them
//! into the SQLite [`store::Store`].

pub mod api;
pub mod cache;
pub mod collect;
pub mod config;
pub mod logging;
pub mod nhl;
pub mod store;
