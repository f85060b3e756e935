//! Persisted response cache for the read API.
//!
//! - **Keys**: deterministic route + params + API version strings
//! - **Store**: deadline-bounded access to a `CachedResponsesRepo` backend
//! - **Handler**: read-through caching with `If-Modified-Since` handling
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! response_cache = true
//! store_timeout_ms = 500
//! ```

mod config;
pub mod freshness;
mod handler;
mod keys;
mod store;

pub use config::CacheConfig;
pub use handler::{CacheRequest, CachedResponseHandler};
pub use keys::{ApiRoute, CONSUMER_ID_PARAM, CacheKey, EVENT_KEY_PARAM, TEAM_KEY_PARAM};
pub use store::{CacheError, MemoryCacheStore, ResponseStore};
