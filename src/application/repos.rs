//! Repository traits describing persistence adapters.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::auth::AuthCredential;
use crate::domain::cache::CacheEntry;
use crate::domain::matches::MatchRecord;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Runs one repository call, failing with [`RepoError::Timeout`] once
/// `deadline` elapses.
pub async fn with_deadline<T>(
    deadline: Duration,
    call: impl Future<Output = Result<T, RepoError>>,
) -> Result<T, RepoError> {
    tokio::time::timeout(deadline, call)
        .await
        .map_err(|_| RepoError::Timeout)?
}

/// Durable key/value store of serialized responses.
#[async_trait]
pub trait CachedResponsesRepo: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, RepoError>;

    /// Full overwrite of any entry stored under `entry.key`.
    async fn put(&self, entry: CacheEntry) -> Result<(), RepoError>;

    /// Deletes every listed key in one atomic operation; missing keys are
    /// ignored. Returns the number of rows removed.
    async fn delete_many(&self, keys: &BTreeSet<String>) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait AuthCredentialsRepo: Send + Sync {
    async fn find_credential(&self, id: &str) -> Result<Option<AuthCredential>, RepoError>;
}

#[async_trait]
pub trait MatchesRepo: Send + Sync {
    /// Matches of one event in play order.
    async fn list_event_matches(&self, event_key: &str) -> Result<Vec<MatchRecord>, RepoError>;
}

/// What an upsert changed.
#[derive(Debug, Clone, Default)]
pub struct UpsertOutcome {
    pub written: u64,
    /// Previously stored versions of the matches that were overwritten.
    pub replaced: Vec<MatchRecord>,
}

#[async_trait]
pub trait MatchesWriteRepo: Send + Sync {
    /// Creates or replaces the listed matches of `event_key`.
    async fn upsert_matches(
        &self,
        event_key: &str,
        matches: &[MatchRecord],
    ) -> Result<UpsertOutcome, RepoError>;
}
