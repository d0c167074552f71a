//! Process-wide tracing subscriber and metric descriptions.

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

enum MetricKind {
    Counter,
    Histogram,
}

struct MetricDescription {
    name: &'static str,
    kind: MetricKind,
    unit: Unit,
    help: &'static str,
}

const METRICS: &[MetricDescription] = &[
    MetricDescription {
        name: "murmur_feed_cache_hit_total",
        kind: MetricKind::Counter,
        unit: Unit::Count,
        help: "Feed list cache hits.",
    },
    MetricDescription {
        name: "murmur_feed_cache_miss_total",
        kind: MetricKind::Counter,
        unit: Unit::Count,
        help: "Feed list cache misses, including discarded undecodable lists.",
    },
    MetricDescription {
        name: "murmur_feed_cache_push_total",
        kind: MetricKind::Counter,
        unit: Unit::Count,
        help: "Feed list pushes by outcome.",
    },
    MetricDescription {
        name: "murmur_feed_cache_degraded_total",
        kind: MetricKind::Counter,
        unit: Unit::Count,
        help: "Shared store failures absorbed by the feed list cache, by operation.",
    },
    MetricDescription {
        name: "murmur_feed_pagination_fallback_total",
        kind: MetricKind::Counter,
        unit: Unit::Count,
        help: "Pages served from the backing store because the cached list was inconclusive.",
    },
    MetricDescription {
        name: "murmur_fanout_entries_total",
        kind: MetricKind::Counter,
        unit: Unit::Count,
        help: "Follower feed rows written or confirmed by fan-out batches.",
    },
    MetricDescription {
        name: "murmur_fanout_batch_ms",
        kind: MetricKind::Histogram,
        unit: Unit::Milliseconds,
        help: "Fan-out batch latency in milliseconds.",
    },
];

static DESCRIBED: Once = Once::new();

/// Install the global subscriber. Fails if one is already installed.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default())
        .with(output_layer(logging.format))
        .try_init()
        .map_err(|err| InfraError::telemetry(format!("tracing subscriber: {err}")))
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    }
}

/// Register help text for every metric this crate emits. Idempotent.
pub fn describe_metrics() {
    DESCRIBED.call_once(|| {
        for metric in METRICS {
            match metric.kind {
                MetricKind::Counter => describe_counter!(metric.name, metric.unit, metric.help),
                MetricKind::Histogram => {
                    describe_histogram!(metric.name, metric.unit, metric.help)
                }
            }
        }
    });
}
