//! Cache storage.
//!
//! `ResponseStore` puts a fixed deadline on every call to the persistence
//! backend. `MemoryCacheStore` is an in-process backend for tests and single
//! instance deployments.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::application::repos::{CachedResponsesRepo, RepoError};
use crate::domain::cache::CacheEntry;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Store(#[from] RepoError),
    #[error("cache store did not answer within {0:?}")]
    Timeout(Duration),
}

/// Deadline-bounded access to the configured persistence backend.
#[derive(Clone)]
pub struct ResponseStore {
    repo: Arc<dyn CachedResponsesRepo>,
    timeout: Duration,
}

impl ResponseStore {
    pub fn new(repo: Arc<dyn CachedResponsesRepo>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        self.bounded(self.repo.get(key)).await
    }

    pub async fn put(&self, entry: CacheEntry) -> Result<(), CacheError> {
        self.bounded(self.repo.put(entry)).await
    }

    pub async fn delete_many(&self, keys: &BTreeSet<String>) -> Result<u64, CacheError> {
        self.bounded(self.repo.delete_many(keys)).await
    }

    async fn bounded<T>(
        &self,
        operation: impl Future<Output = Result<T, RepoError>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.timeout, operation).await {
            Ok(result) => result.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(self.timeout)),
        }
    }
}

/// Sharded in-memory backend. Entries are replaced whole, so readers see
/// either the previous or the next version of an entry, never a mix.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CachedResponsesRepo for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, RepoError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), RepoError> {
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete_many(&self, keys: &BTreeSet<String>) -> Result<u64, RepoError> {
        let removed = keys
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }
}
