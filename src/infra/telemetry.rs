use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "tba_api_cache_hit_total",
            Unit::Count,
            "Responses replayed from the response cache."
        );
        describe_counter!(
            "tba_api_cache_miss_total",
            Unit::Count,
            "Requests with no cached response, served by the route handler."
        );
        describe_counter!(
            "tba_api_cache_not_modified_total",
            Unit::Count,
            "Conditional requests answered with 304 Not Modified."
        );
        describe_counter!(
            "tba_api_cache_store_error_total",
            Unit::Count,
            "Response cache store operations that failed or timed out."
        );
        describe_counter!(
            "tba_api_tracking_enqueued_total",
            Unit::Count,
            "Usage events queued for delivery."
        );
        describe_counter!(
            "tba_api_tracking_dropped_total",
            Unit::Count,
            "Usage events dropped because the queue was full or closed."
        );
        describe_counter!(
            "tba_api_tracking_failed_total",
            Unit::Count,
            "Usage events the analytics sink did not accept."
        );
    });
}
