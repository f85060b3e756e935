//! Signed write access for trusted uploaders.
//!
//! A request is accepted when it carries a credential id and an
//! HMAC-SHA256 signature of `path "\n" body` keyed with that credential's
//! shared secret, and the credential is scoped to the target resource.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::ingest::{MatchParser, ParseInputError};
use crate::application::repos::{AuthCredentialsRepo, MatchesWriteRepo, RepoError, with_deadline};
use crate::cache::{
    ApiRoute, CacheError, CacheKey, CachedResponseHandler, EVENT_KEY_PARAM, TEAM_KEY_PARAM,
};
use crate::domain::auth::AuthCredential;
use crate::domain::matches::MatchRecord;

pub const AUTH_ID_HEADER: &str = "X-TBA-Auth-Id";
pub const AUTH_SIG_HEADER: &str = "X-TBA-Auth-Sig";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Must provide a request header parameter '{0}'")]
    MissingHeader(&'static str),
    #[error("Invalid X-TBA-Auth-Id and/or X-TBA-Auth-Sig!")]
    InvalidCredential,
    #[error("Only allowed to edit events: {}", .allowed.join(", "))]
    ResourceNotAuthorized { allowed: Vec<String> },
    #[error("credential lookup failed")]
    Store(#[from] RepoError),
}

impl AuthError {
    /// Client-caused failures; a store failure is an internal fault.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

/// Lowercase hex HMAC-SHA256 of `path "\n" body` keyed with `secret`.
///
/// The separator keeps `("/a", "b")` and `("/ab", "")` from colliding.
pub fn sign(secret: &str, path: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(path.as_bytes());
    mac.update(b"\n");
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Header values and payload of one signed write.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub credential_id: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub path: &'a str,
    pub body: &'a [u8],
    pub resource_key: &'a str,
}

#[derive(Clone)]
pub struct SignedRequestAuthenticator {
    credentials: Arc<dyn AuthCredentialsRepo>,
    lookup_timeout: Duration,
}

impl SignedRequestAuthenticator {
    pub fn new(credentials: Arc<dyn AuthCredentialsRepo>, lookup_timeout: Duration) -> Self {
        Self {
            credentials,
            lookup_timeout,
        }
    }

    pub async fn authorize(&self, request: &SignedRequest<'_>) -> Result<AuthCredential, AuthError> {
        let credential_id = non_empty(request.credential_id)
            .ok_or(AuthError::MissingHeader(AUTH_ID_HEADER))?;
        let signature =
            non_empty(request.signature).ok_or(AuthError::MissingHeader(AUTH_SIG_HEADER))?;

        let credential = with_deadline(
            self.lookup_timeout,
            self.credentials.find_credential(credential_id),
        )
        .await?
        .ok_or(AuthError::InvalidCredential)?;

        let expected = sign(&credential.secret, request.path, request.body)
            .ok_or(AuthError::InvalidCredential)?;
        let supplied = signature.trim().to_ascii_lowercase();
        if expected.as_bytes().ct_eq(supplied.as_bytes()).unwrap_u8() == 0 {
            warn!(
                target = "tba_api::trusted",
                credential_id, "signature mismatch"
            );
            return Err(AuthError::InvalidCredential);
        }

        if !credential.authorizes(request.resource_key) {
            return Err(AuthError::ResourceNotAuthorized {
                allowed: credential
                    .authorized_list()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            });
        }

        Ok(credential)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Error)]
pub enum TrustedWriteError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Parse(#[from] ParseInputError),
    #[error("failed to store matches")]
    Repo(#[source] RepoError),
    #[error("failed to invalidate cached responses")]
    Invalidation(#[source] CacheError),
}

/// Acknowledgement returned to the uploader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchUpdateSummary {
    pub event_key: String,
    pub matches_written: u64,
    pub cache_keys_invalidated: u64,
}

pub struct TrustedWriteService {
    authenticator: SignedRequestAuthenticator,
    parser: Arc<dyn MatchParser>,
    matches: Arc<dyn MatchesWriteRepo>,
    cache: Arc<CachedResponseHandler>,
    api_version: u32,
    write_timeout: Duration,
}

impl TrustedWriteService {
    pub fn new(
        authenticator: SignedRequestAuthenticator,
        parser: Arc<dyn MatchParser>,
        matches: Arc<dyn MatchesWriteRepo>,
        cache: Arc<CachedResponseHandler>,
        api_version: u32,
        write_timeout: Duration,
    ) -> Self {
        Self {
            authenticator,
            parser,
            matches,
            cache,
            api_version,
            write_timeout,
        }
    }

    /// Authorizes, parses and stores an event's matches, then drops every
    /// cached read response the upload can have changed. That includes the
    /// team listings of teams dropped from an overwritten match.
    ///
    /// Storing is idempotent, so a failed invalidation is reported and the
    /// uploader can simply retry.
    pub async fn update_matches(
        &self,
        request: SignedRequest<'_>,
    ) -> Result<MatchUpdateSummary, TrustedWriteError> {
        let credential = self.authenticator.authorize(&request).await?;
        let event_key = request.resource_key;

        let matches = self.parser.parse(request.body)?;
        let outcome = with_deadline(
            self.write_timeout,
            self.matches.upsert_matches(event_key, &matches),
        )
        .await
        .map_err(TrustedWriteError::Repo)?;
        let matches_written = outcome.written;

        let keys = affected_cache_keys(
            event_key,
            matches.iter().chain(&outcome.replaced),
            self.api_version,
        );
        let cache_keys_invalidated = self
            .cache
            .invalidate(&keys)
            .await
            .map_err(TrustedWriteError::Invalidation)?;

        info!(
            target = "tba_api::trusted",
            credential_id = %credential.id,
            event_key,
            matches_written,
            cache_keys_invalidated,
            "matches updated"
        );

        Ok(MatchUpdateSummary {
            event_key: event_key.to_string(),
            matches_written,
            cache_keys_invalidated,
        })
    }
}

/// Read-API cache keys whose responses depend on `event_key`'s matches.
pub fn affected_cache_keys<'a>(
    event_key: &str,
    matches: impl IntoIterator<Item = &'a MatchRecord>,
    api_version: u32,
) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    keys.insert(
        CacheKey::compute(
            ApiRoute::EventMatches,
            [(EVENT_KEY_PARAM, event_key)],
            api_version,
        )
        .into_string(),
    );

    let teams: BTreeSet<String> = matches.into_iter().flat_map(MatchRecord::teams).collect();
    for team in &teams {
        keys.insert(
            CacheKey::compute(
                ApiRoute::TeamEventMatches,
                [(EVENT_KEY_PARAM, event_key), (TEAM_KEY_PARAM, team.as_str())],
                api_version,
            )
            .into_string(),
        );
    }
    keys
}
