use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::updates::{
    METRIC_UPDATE_COMPLETED_TOTAL, METRIC_UPDATE_IN_FLIGHT, METRIC_UPDATE_REQUEUE_TOTAL,
    METRIC_UPDATE_ROLLBACK_TOTAL,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;
use super::http::METRIC_HTTP_REQUEST_MS;
use super::read_through::{METRIC_CACHE_HIT_TOTAL, METRIC_CACHE_MISS_TOTAL};

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
            METRIC_CACHE_HIT_TOTAL,
            Unit::Count,
            "Total number of image reads served from the cache."
        );
        describe_counter!(
            METRIC_CACHE_MISS_TOTAL,
            Unit::Count,
            "Total number of image reads that fell through to the durable store."
        );
        describe_counter!(
            METRIC_UPDATE_COMPLETED_TOTAL,
            Unit::Count,
            "Total number of update jobs whose build finished successfully."
        );
        describe_counter!(
            METRIC_UPDATE_ROLLBACK_TOTAL,
            Unit::Count,
            "Total number of update jobs rolled back after failure or expiry."
        );
        describe_counter!(
            METRIC_UPDATE_REQUEUE_TOTAL,
            Unit::Count,
            "Total number of times an unfinished update job was requeued."
        );
        describe_gauge!(
            METRIC_UPDATE_IN_FLIGHT,
            Unit::Count,
            "Current number of update jobs being worked on."
        );
        describe_histogram!(
            METRIC_HTTP_REQUEST_MS,
            Unit::Milliseconds,
            "HTTP request latency in milliseconds."
        );
    });
}
