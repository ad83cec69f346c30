use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::engine::{METRIC_CONVERT_MS, METRIC_ENGINE_LAUNCH_TOTAL};
use crate::cache::{
    METRIC_COMPILED_HIT, METRIC_COMPILED_MISS, METRIC_SOURCE_HIT, METRIC_SOURCE_MISS,
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
            METRIC_SOURCE_HIT,
            Unit::Count,
            "Total number of layout source cache hits."
        );
        describe_counter!(
            METRIC_SOURCE_MISS,
            Unit::Count,
            "Total number of layout source cache misses."
        );
        describe_counter!(
            METRIC_COMPILED_HIT,
            Unit::Count,
            "Total number of compiled layout cache hits."
        );
        describe_counter!(
            METRIC_COMPILED_MISS,
            Unit::Count,
            "Total number of compiled layout cache misses."
        );
        describe_counter!(
            METRIC_ENGINE_LAUNCH_TOTAL,
            Unit::Count,
            "Total number of rendering engine launches, including restarts."
        );
        describe_histogram!(
            METRIC_CONVERT_MS,
            Unit::Milliseconds,
            "Markup-to-PDF conversion latency in milliseconds."
        );
    });
}
