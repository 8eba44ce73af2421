//! Generic response caching.
//!
//! This module is API-agnostic:
//! - Requests are identified by a [`RequestKey`] with a SHA-256 fingerprint
//! - Entries expire after a per-call TTL and are evicted lazily
//! - Concurrent misses for one key collapse into a single fetch

mod entry;
mod key;
mod layer;

pub use entry::{CacheEntry, CacheSource, Lookup};
pub use key::RequestKey;
pub use layer::ResponseCache;
