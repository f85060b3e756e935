//! Persisted response cache entries.

use std::collections::BTreeMap;

use bytes::Bytes;
use time::OffsetDateTime;

/// One serialized HTTP response stored under a caller-defined cache key.
///
/// Writes always replace the whole entry; there is no partial merge of
/// headers or body. Entries are never expired by the store itself, only
/// deleted by explicit invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    /// Lowercase header name to every value sent under it, in order.
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: Bytes,
    /// Second precision, matching the `Last-Modified` header it backs.
    pub updated_at: OffsetDateTime,
}

impl CacheEntry {
    /// True when a client holding a copy from `since` already has this version.
    pub fn is_unmodified_since(&self, since: OffsetDateTime) -> bool {
        self.updated_at <= since
    }
}
