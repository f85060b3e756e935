#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tokio::sync::Mutex;

use tba_api::application::ingest::JsonMatchParser;
use tba_api::application::repos::{
    AuthCredentialsRepo, CachedResponsesRepo, MatchesRepo, MatchesWriteRepo, RepoError,
    UpsertOutcome,
};
use tba_api::application::tracking::{TrackingError, UsageEvent, UsageSink, UsageTracker};
use tba_api::application::trusted::{SignedRequestAuthenticator, TrustedWriteService};
use tba_api::cache::{CacheConfig, CachedResponseHandler, MemoryCacheStore, ResponseStore};
use tba_api::domain::auth::AuthCredential;
use tba_api::domain::cache::CacheEntry;
use tba_api::domain::matches::{Alliance, Alliances, CompLevel, MatchRecord};
use tba_api::infra::http::api::PublicApiController;
use tba_api::infra::http::api::handlers::{EventMatchesHandler, TeamEventMatchesHandler};
use tba_api::infra::http::{ApiState, RouterState, TrustedState, build_router};
use tower::ServiceExt;

pub const API_VERSION: u32 = 3;
pub const CREDENTIAL_ID: &str = "scorekeeper";
pub const CREDENTIAL_SECRET: &str = "s3cret";
pub const CONSUMER_ID: &str = "frc254:scouting:v1";
pub const QUERY_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Default)]
pub struct MemoryMatches {
    events: Mutex<HashMap<String, Vec<MatchRecord>>>,
}

impl MemoryMatches {
    pub async fn seed(&self, event_key: &str, matches: Vec<MatchRecord>) {
        self.events
            .lock()
            .await
            .insert(event_key.to_string(), matches);
    }

    pub async fn count(&self, event_key: &str) -> usize {
        self.events
            .lock()
            .await
            .get(event_key)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl MatchesRepo for MemoryMatches {
    async fn list_event_matches(&self, event_key: &str) -> Result<Vec<MatchRecord>, RepoError> {
        let mut matches = self
            .events
            .lock()
            .await
            .get(event_key)
            .cloned()
            .unwrap_or_default();
        matches.sort_by_key(MatchRecord::sort_key);
        Ok(matches)
    }
}

#[async_trait]
impl MatchesWriteRepo for MemoryMatches {
    async fn upsert_matches(
        &self,
        event_key: &str,
        matches: &[MatchRecord],
    ) -> Result<UpsertOutcome, RepoError> {
        let mut events = self.events.lock().await;
        let stored = events.entry(event_key.to_string()).or_default();
        let mut replaced = Vec::new();
        for record in matches {
            let key = record.key_name(event_key);
            if let Some(position) = stored
                .iter()
                .position(|existing| existing.key_name(event_key) == key)
            {
                replaced.push(stored.remove(position));
            }
            stored.push(record.clone());
        }
        Ok(UpsertOutcome {
            written: matches.len() as u64,
            replaced,
        })
    }
}

pub struct HangingMatches;

#[async_trait]
impl MatchesRepo for HangingMatches {
    async fn list_event_matches(&self, _event_key: &str) -> Result<Vec<MatchRecord>, RepoError> {
        std::future::pending().await
    }
}

pub struct StaticCredentials {
    credentials: Vec<AuthCredential>,
}

#[async_trait]
impl AuthCredentialsRepo for StaticCredentials {
    async fn find_credential(&self, id: &str) -> Result<Option<AuthCredential>, RepoError> {
        Ok(self
            .credentials
            .iter()
            .find(|credential| credential.id == id)
            .cloned())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<UsageEvent>>,
}

#[async_trait]
impl UsageSink for RecordingSink {
    async fn deliver(&self, event: &UsageEvent) -> Result<(), TrackingError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

pub struct FailingSink;

#[async_trait]
impl UsageSink for FailingSink {
    async fn deliver(&self, _event: &UsageEvent) -> Result<(), TrackingError> {
        Err(TrackingError::Status(503))
    }
}

pub struct HangingSink;

#[async_trait]
impl UsageSink for HangingSink {
    async fn deliver(&self, _event: &UsageEvent) -> Result<(), TrackingError> {
        std::future::pending().await
    }
}

pub struct FailingCacheRepo;

#[async_trait]
impl CachedResponsesRepo for FailingCacheRepo {
    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, RepoError> {
        Err(RepoError::from_persistence("connection refused"))
    }

    async fn put(&self, _entry: CacheEntry) -> Result<(), RepoError> {
        Err(RepoError::from_persistence("connection refused"))
    }

    async fn delete_many(&self, _keys: &BTreeSet<String>) -> Result<u64, RepoError> {
        Err(RepoError::from_persistence("connection refused"))
    }
}

pub struct HangingCacheRepo;

#[async_trait]
impl CachedResponsesRepo for HangingCacheRepo {
    async fn get(&self, _key: &str) -> Result<Option<CacheEntry>, RepoError> {
        std::future::pending().await
    }

    async fn put(&self, _entry: CacheEntry) -> Result<(), RepoError> {
        std::future::pending().await
    }

    async fn delete_many(&self, _keys: &BTreeSet<String>) -> Result<u64, RepoError> {
        std::future::pending().await
    }
}

/// Collaborators swapped in place of the in-memory defaults.
#[derive(Default)]
pub struct TestAppOptions {
    pub config: CacheConfig,
    pub cache_repo: Option<Arc<dyn CachedResponsesRepo>>,
    pub sink: Option<Arc<dyn UsageSink>>,
    pub reads: Option<Arc<dyn MatchesRepo>>,
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryCacheStore>,
    pub matches: Arc<MemoryMatches>,
    pub sink: Arc<RecordingSink>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(CacheConfig::default()).await
    }

    pub async fn with_config(config: CacheConfig) -> Self {
        Self::with_options(TestAppOptions {
            config,
            ..TestAppOptions::default()
        })
        .await
    }

    pub async fn with_options(options: TestAppOptions) -> Self {
        let TestAppOptions {
            config,
            cache_repo,
            sink: usage_sink,
            reads,
        } = options;

        let store = Arc::new(MemoryCacheStore::new());
        let matches = Arc::new(MemoryMatches::default());
        matches.seed("2020ab", sample_matches()).await;
        let sink = Arc::new(RecordingSink::default());
        let reads: Arc<dyn MatchesRepo> = match reads {
            Some(reads) => reads,
            None => matches.clone(),
        };

        let cache_repo: Arc<dyn CachedResponsesRepo> = match cache_repo {
            Some(cache_repo) => cache_repo,
            None => store.clone(),
        };
        let cache = Arc::new(CachedResponseHandler::new(
            ResponseStore::new(cache_repo, config.store_timeout()),
            config,
        ));
        let usage_sink: Arc<dyn UsageSink> = match usage_sink {
            Some(usage_sink) => usage_sink,
            None => sink.clone(),
        };
        let (tracker, _worker) = UsageTracker::spawn(
            usage_sink,
            NonZeroUsize::new(64).expect("capacity"),
            Duration::from_secs(1),
        );

        let credentials = Arc::new(StaticCredentials {
            credentials: vec![AuthCredential {
                id: CREDENTIAL_ID.to_string(),
                secret: CREDENTIAL_SECRET.to_string(),
                authorized_resource_keys: BTreeSet::from(["2020ab".to_string()]),
            }],
        });

        let state = RouterState {
            api: ApiState {
                controller: Arc::new(PublicApiController::new(
                    cache.clone(),
                    tracker,
                    API_VERSION,
                )),
                event_matches: Arc::new(EventMatchesHandler::new(reads.clone(), QUERY_TIMEOUT)),
                team_event_matches: Arc::new(TeamEventMatchesHandler::new(reads, QUERY_TIMEOUT)),
            },
            trusted: TrustedState {
                service: Arc::new(TrustedWriteService::new(
                    SignedRequestAuthenticator::new(credentials, QUERY_TIMEOUT),
                    Arc::new(JsonMatchParser),
                    matches.clone(),
                    cache,
                    API_VERSION,
                    QUERY_TIMEOUT,
                )),
            },
        };

        Self {
            router: build_router(state),
            store,
            matches,
            sink,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

pub fn qualification(number: u32, red: [&str; 3], blue: [&str; 3]) -> MatchRecord {
    MatchRecord {
        comp_level: CompLevel::Qm,
        set_number: 1,
        match_number: number,
        alliances: Alliances {
            red: Alliance {
                teams: red.iter().map(|team| team.to_string()).collect(),
                score: 40,
            },
            blue: Alliance {
                teams: blue.iter().map(|team| team.to_string()).collect(),
                score: 35,
            },
        },
        team_key_names: Vec::new(),
        videos: Vec::new(),
    }
}

pub fn sample_matches() -> Vec<MatchRecord> {
    vec![
        qualification(2, ["frc4", "frc5", "frc6"], ["frc1", "frc2", "frc3"]),
        qualification(1, ["frc254", "frc971", "frc1678"], ["frc1", "frc2", "frc3"]),
    ]
}
