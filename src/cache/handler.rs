//! Read-through response cache with conditional GET support.
//!
//! Reads always consult the store. Writes happen only when the deployment
//! enables the response cache. Any store failure degrades to calling the
//! downstream handler; the cache never decides whether a request succeeds.

use std::collections::{BTreeMap, BTreeSet};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::application::error::ErrorReport;
use crate::domain::cache::CacheEntry;

use super::{
    CacheConfig,
    freshness::{cache_control_value, format_http_date, truncate_to_second},
    keys::CacheKey,
    store::{CacheError, ResponseStore},
};

const METRIC_CACHE_HIT: &str = "tba_api_cache_hit_total";
const METRIC_CACHE_MISS: &str = "tba_api_cache_miss_total";
const METRIC_CACHE_NOT_MODIFIED: &str = "tba_api_cache_not_modified_total";
const METRIC_CACHE_STORE_ERROR: &str = "tba_api_cache_store_error_total";

/// Largest downstream body the handler will buffer for storage.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Per-request cache inputs computed by the controller.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub key: CacheKey,
    pub if_modified_since: Option<OffsetDateTime>,
    /// Lifetime requested by the route; clamped before it is advertised.
    pub max_age: u32,
}

enum Lookup {
    Found(CacheEntry),
    Missing,
    Unavailable,
}

pub struct CachedResponseHandler {
    store: ResponseStore,
    config: CacheConfig,
}

impl CachedResponseHandler {
    pub fn new(store: ResponseStore, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Serves `request` from the store, or runs `downstream` exactly once on a
    /// miss and writes its successful response back.
    ///
    /// Errors from `downstream` are returned untouched and never cached.
    pub async fn handle<F, Fut, E>(
        &self,
        request: &CacheRequest,
        downstream: F,
    ) -> Result<Response, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Response, E>>,
    {
        match self.lookup(&request.key).await {
            Lookup::Found(entry) => {
                if request
                    .if_modified_since
                    .is_some_and(|since| entry.is_unmodified_since(since))
                {
                    counter!(METRIC_CACHE_NOT_MODIFIED).increment(1);
                    debug!(cache = "response", outcome = "not_modified", key = %request.key);
                    return Ok(not_modified(&entry, request.max_age));
                }
                counter!(METRIC_CACHE_HIT).increment(1);
                debug!(cache = "response", outcome = "hit", key = %request.key);
                Ok(replay(entry))
            }
            Lookup::Missing => {
                counter!(METRIC_CACHE_MISS).increment(1);
                debug!(cache = "response", outcome = "miss", key = %request.key);
                self.compute(request, downstream, true).await
            }
            Lookup::Unavailable => self.compute(request, downstream, false).await,
        }
    }

    /// Recomputes the response regardless of what is stored and overwrites
    /// the entry.
    pub async fn refresh<F, Fut, E>(
        &self,
        request: &CacheRequest,
        downstream: F,
    ) -> Result<Response, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Response, E>>,
    {
        self.compute(request, downstream, true).await
    }

    /// Deletes every entry in `keys` in one store call. Keys without an entry
    /// are ignored; the call either removes all present entries or fails.
    pub async fn invalidate(&self, keys: &BTreeSet<String>) -> Result<u64, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed = self.store.delete_many(keys).await?;
        debug!(
            cache = "response",
            requested = keys.len(),
            removed,
            "invalidated cache keys"
        );
        Ok(removed)
    }

    async fn lookup(&self, key: &CacheKey) -> Lookup {
        match self.store.get(key.as_str()).await {
            Ok(Some(entry)) => Lookup::Found(entry),
            Ok(None) => Lookup::Missing,
            Err(error) => {
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "get").increment(1);
                warn!(
                    cache = "response",
                    key = %key,
                    error = %error,
                    "cache read failed, serving without cache"
                );
                Lookup::Unavailable
            }
        }
    }

    async fn compute<F, Fut, E>(
        &self,
        request: &CacheRequest,
        downstream: F,
        store_reachable: bool,
    ) -> Result<Response, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Response, E>>,
    {
        let response = downstream().await?;
        if response.status() != StatusCode::OK {
            return Ok(response);
        }

        let updated_at = truncate_to_second(OffsetDateTime::now_utc());
        let (mut parts, body) = response.into_parts();
        stamp_freshness(&mut parts.headers, updated_at, request.max_age);

        let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
            Ok(bytes) => bytes,
            Err(err) => {
                let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
                ErrorReport::from_error(
                    "cache::handler::buffer",
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &err,
                )
                .attach(&mut response);
                return Ok(response);
            }
        };

        if self.config.response_cache && store_reachable {
            let entry = CacheEntry {
                key: request.key.as_str().to_string(),
                headers: serialize_headers(&parts.headers),
                body: bytes.clone(),
                updated_at,
            };
            if let Err(error) = self.store.put(entry).await {
                counter!(METRIC_CACHE_STORE_ERROR, "op" => "put").increment(1);
                warn!(
                    cache = "response",
                    key = %request.key,
                    error = %error,
                    "cache write failed"
                );
            }
        }

        Ok(Response::from_parts(parts, Body::from(bytes)))
    }
}

fn stamp_freshness(headers: &mut HeaderMap, updated_at: OffsetDateTime, max_age: u32) {
    if let Some(value) = format_http_date(updated_at).and_then(|v| HeaderValue::from_str(&v).ok())
    {
        headers.insert(header::LAST_MODIFIED, value);
    }
    if let Ok(value) = HeaderValue::from_str(&cache_control_value(max_age)) {
        headers.insert(header::CACHE_CONTROL, value);
    }
}

/// Keeps every value of repeated headers; values that are not visible ASCII
/// are dropped.
fn serialize_headers(headers: &HeaderMap) -> BTreeMap<String, Vec<String>> {
    let mut serialized: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            serialized
                .entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    serialized
}

fn restore_headers(entry: &CacheEntry, headers: &mut HeaderMap) {
    for (name, values) in &entry.headers {
        let Ok(name) = header::HeaderName::from_bytes(name.as_bytes()) else {
            continue;
        };
        headers.remove(&name);
        for value in values {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.append(name.clone(), value);
            }
        }
    }
}

fn replay(entry: CacheEntry) -> Response {
    let mut response = Response::new(Body::from(entry.body.clone()));
    restore_headers(&entry, response.headers_mut());
    if let Some(value) =
        format_http_date(entry.updated_at).and_then(|v| HeaderValue::from_str(&v).ok())
    {
        response.headers_mut().insert(header::LAST_MODIFIED, value);
    }
    response
}

fn not_modified(entry: &CacheEntry, max_age: u32) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NOT_MODIFIED;
    stamp_freshness(response.headers_mut(), entry.updated_at, max_age);
    response
}
