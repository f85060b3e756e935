use std::{collections::BTreeSet, future::IntoFuture, process, sync::Arc};

use tba_api::{
    application::{
        error::AppError,
        ingest::JsonMatchParser,
        tracking::UsageTracker,
        trusted::{SignedRequestAuthenticator, TrustedWriteService},
    },
    cache::{CacheConfig, CachedResponseHandler, ResponseStore},
    config,
    infra::{
        analytics::HttpTrackingSink,
        db::PostgresRepositories,
        error::InfraError,
        http::{
            self, ApiState, RouterState, TrustedState,
            api::{
                PublicApiController,
                handlers::{EventMatchesHandler, TeamEventMatchesHandler},
            },
        },
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Cache(args) => match args.command {
            config::CacheCommand::Invalidate(invalidate) => {
                run_cache_invalidate(settings, invalidate.keys).await
            }
        },
    }
}

async fn init_repositories(settings: &config::Settings) -> Result<PostgresRepositories, AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| AppError::validation("database.url is required"))?;

    let pool = PostgresRepositories::connect(
        url,
        settings.database.max_connections.get(),
        settings.database.query_timeout,
    )
    .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(PostgresRepositories::new(pool))
}

fn build_cache_handler(
    repositories: &PostgresRepositories,
    settings: &config::Settings,
) -> Arc<CachedResponseHandler> {
    let cache_config = CacheConfig::from(&settings.cache);
    let store = ResponseStore::new(
        Arc::new(repositories.clone()),
        cache_config.store_timeout(),
    );
    Arc::new(CachedResponseHandler::new(store, cache_config))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let repos = Arc::new(repositories.clone());
    let cache = build_cache_handler(&repositories, &settings);

    let sink = HttpTrackingSink::new(&settings.analytics).map_err(AppError::from)?;
    if !sink.is_configured() {
        warn!(
            target = "tba_api::tracking",
            "analytics tracking id not set, usage events will be skipped"
        );
    }
    let (tracker, tracker_handle) = UsageTracker::spawn(
        Arc::new(sink),
        settings.analytics.queue_capacity,
        settings.analytics.timeout,
    );

    let api_version = settings.api.version;
    let query_timeout = settings.database.query_timeout;
    let api_state = ApiState {
        controller: Arc::new(PublicApiController::new(
            cache.clone(),
            tracker,
            api_version,
        )),
        event_matches: Arc::new(EventMatchesHandler::new(repos.clone(), query_timeout)),
        team_event_matches: Arc::new(TeamEventMatchesHandler::new(repos.clone(), query_timeout)),
    };
    let trusted_state = TrustedState {
        service: Arc::new(TrustedWriteService::new(
            SignedRequestAuthenticator::new(repos.clone(), query_timeout),
            Arc::new(JsonMatchParser),
            repos,
            cache,
            api_version,
            query_timeout,
        )),
    };

    let result = serve_http(
        &settings,
        RouterState {
            api: api_state,
            trusted: trusted_state,
        },
    )
    .await;

    // The router owned every tracker handle; wait briefly for queued events.
    if tokio::time::timeout(settings.analytics.timeout, tracker_handle)
        .await
        .is_err()
    {
        warn!(
            target = "tba_api::tracking",
            "usage worker did not drain before shutdown"
        );
    }

    result
}

async fn serve_http(settings: &config::Settings, state: RouterState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "tba_api::server",
        addr = %settings.server.addr,
        "listening"
    );

    let shutdown = Arc::new(Notify::new());
    let trigger = shutdown.clone();
    let mut server = tokio::spawn(
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move { trigger.notified().await })
            .into_future(),
    );

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        () = shutdown_signal() => {}
    }

    info!(
        target = "tba_api::server",
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown requested, draining connections"
    );
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "tba_api::server",
                "graceful shutdown timed out, closing remaining connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "tba_api::server", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "tba_api::server", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

async fn run_cache_invalidate(
    settings: config::Settings,
    keys: Vec<String>,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let cache = build_cache_handler(&repositories, &settings);

    let keys: BTreeSet<String> = keys
        .into_iter()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .collect();

    let removed = cache
        .invalidate(&keys)
        .await
        .map_err(|err| AppError::unexpected(format!("cache invalidation failed: {err}")))?;

    info!(
        target = "tba_api::cache",
        requested = keys.len(),
        removed,
        "cache keys invalidated"
    );
    Ok(())
}
