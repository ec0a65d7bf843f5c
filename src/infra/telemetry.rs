use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing::Subscriber;
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

const COUNTERS: &[(&str, &str)] = &[
    ("youyou_cache_hits_total", "Snapshot and id-list lookups served from the cache."),
    ("youyou_cache_misses_total", "Lookups that fell through to the entity store."),
    ("youyou_cache_errors_total", "Cache calls that failed and were treated as misses."),
    ("youyou_cache_evictions_total", "Keys deleted from the object cache."),
    ("youyou_counter_writes_total", "Denormalized counters written back to the store."),
];

const HISTOGRAMS: &[(&str, &str)] = &[
    ("youyou_recount_ms", "Wall time of one recount batch."),
    ("youyou_cache_invalidation_ms", "Wall time of one id-list eviction pass."),
];

/// Installs the global subscriber: env filter, span traces for errors, then
/// the configured formatter.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    METRIC_DESCRIPTIONS.call_once(describe_metrics);

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(formatter(logging.format))
        .try_init()
        .map_err(|err| InfraError::Telemetry(err.to_string()))
}

fn formatter<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    }
}

fn describe_metrics() {
    for (name, help) in COUNTERS {
        describe_counter!(*name, Unit::Count, *help);
    }
    for (name, help) in HISTOGRAMS {
        describe_histogram!(*name, Unit::Milliseconds, *help);
    }
}
