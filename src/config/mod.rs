//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "tba-api";
const ENV_PREFIX: &str = "TBA_API";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_QUERY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 500;
const DEFAULT_ANALYTICS_ENDPOINT: &str = "https://www.google-analytics.com/collect";
const DEFAULT_ANALYTICS_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_ANALYTICS_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_API_VERSION: u32 = 1;

/// Command-line arguments for the API binary.
#[derive(Debug, Parser)]
#[command(name = "tba-api", version, about = "Competition data read and trusted write API")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TBA_API_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP API.
    Serve(Box<ServeArgs>),
    /// Response cache maintenance.
    Cache(CacheArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Toggle writes to the response cache.
    #[arg(
        long = "response-cache",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub response_cache: Option<bool>,

    /// Override the analytics tracking id.
    #[arg(long = "analytics-tracking-id", value_name = "ID")]
    pub analytics_tracking_id: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CacheCommand {
    /// Delete cached responses by key.
    #[command(name = "invalidate")]
    Invalidate(CacheInvalidateArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CacheInvalidateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Cache keys to delete.
    #[arg(value_name = "KEY", required = true)]
    pub keys: Vec<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub analytics: AnalyticsSettings,
    pub api: ApiSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    /// Upper bound on acquiring a connection and on each repository call.
    pub query_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub response_cache: bool,
    pub store_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    /// Absent means usage tracking is a logged no-op.
    pub tracking_id: Option<String>,
    pub endpoint: Url,
    pub timeout: Duration,
    pub queue_capacity: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub version: u32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Cache(args)) => match &args.command {
            CacheCommand::Invalidate(invalidate) => {
                raw.apply_database_override(&invalidate.database)
            }
        },
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    analytics: RawAnalyticsSettings,
    api: RawApiSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(enabled) = overrides.response_cache {
            self.cache.response_cache = Some(enabled);
        }
        if let Some(id) = overrides.analytics_tracking_id.as_ref() {
            self.analytics.tracking_id = Some(id.clone());
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            analytics,
            api,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            analytics: build_analytics_settings(analytics)?,
            api: build_api_settings(api)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    let query_timeout_ms = database
        .query_timeout_ms
        .unwrap_or(DEFAULT_DB_QUERY_TIMEOUT_MS);
    if query_timeout_ms == 0 {
        return Err(LoadError::invalid(
            "database.query_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(DatabaseSettings {
        url,
        max_connections,
        query_timeout: Duration::from_millis(query_timeout_ms),
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let timeout_ms = cache.store_timeout_ms.unwrap_or(DEFAULT_STORE_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "cache.store_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        response_cache: cache.response_cache.unwrap_or(true),
        store_timeout: Duration::from_millis(timeout_ms),
    })
}

fn build_analytics_settings(
    analytics: RawAnalyticsSettings,
) -> Result<AnalyticsSettings, LoadError> {
    let endpoint_value = analytics
        .endpoint
        .unwrap_or_else(|| DEFAULT_ANALYTICS_ENDPOINT.to_string());
    let endpoint = Url::parse(endpoint_value.trim())
        .map_err(|err| LoadError::invalid("analytics.endpoint", format!("invalid url: {err}")))?;
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "analytics.endpoint",
            "scheme must be http or https",
        ));
    }

    let timeout_ms = analytics
        .timeout_ms
        .unwrap_or(DEFAULT_ANALYTICS_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(LoadError::invalid(
            "analytics.timeout_ms",
            "must be greater than zero",
        ));
    }

    let queue_capacity = NonZeroUsize::new(
        analytics
            .queue_capacity
            .unwrap_or(DEFAULT_ANALYTICS_QUEUE_CAPACITY),
    )
    .ok_or_else(|| LoadError::invalid("analytics.queue_capacity", "must be greater than zero"))?;

    Ok(AnalyticsSettings {
        tracking_id: non_blank(analytics.tracking_id),
        endpoint,
        timeout: Duration::from_millis(timeout_ms),
        queue_capacity,
    })
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let version = api.version.unwrap_or(DEFAULT_API_VERSION);
    if version == 0 {
        return Err(LoadError::invalid("api.version", "must be greater than zero"));
    }
    Ok(ApiSettings { version })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
    query_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    response_cache: Option<bool>,
    store_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAnalyticsSettings {
    tracking_id: Option<String>,
    endpoint: Option<String>,
    timeout_ms: Option<u64>,
    queue_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    version: Option<u32>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
