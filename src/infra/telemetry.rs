use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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
            "foglio_http_requests_total",
            Unit::Count,
            "Total number of HTTP requests served."
        );
        describe_histogram!(
            "foglio_http_request_ms",
            Unit::Milliseconds,
            "HTTP request latency in milliseconds."
        );
        describe_counter!(
            "foglio_lifecycle_transition_total",
            Unit::Count,
            "Total number of post lifecycle transitions applied."
        );
        describe_counter!(
            "foglio_lifecycle_rejected_total",
            Unit::Count,
            "Total number of lifecycle transitions refused by the table."
        );
        describe_gauge!(
            "foglio_moderation_queue_len",
            Unit::Count,
            "Posts currently waiting in the moderation queue."
        );
        describe_counter!(
            "foglio_publish_jobs_total",
            Unit::Count,
            "Total number of scheduled publish jobs processed."
        );
        describe_counter!(
            "foglio_assist_requests_total",
            Unit::Count,
            "Total number of content-assist provider calls."
        );
        describe_counter!(
            "foglio_identity_cache_hit_total",
            Unit::Count,
            "Token verifications answered from the cache."
        );
        describe_counter!(
            "foglio_identity_cache_miss_total",
            Unit::Count,
            "Token verifications forwarded to the identity provider."
        );
    });
}

#[cfg(test)]
mod tests {
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    use super::*;

    #[test]
    fn described_counters_carry_units() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            describe_metrics();
            metrics::counter!("foglio_publish_jobs_total").increment(2);
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let entry = snapshot
            .into_iter()
            .find(|(key, ..)| key.key().name() == "foglio_publish_jobs_total")
            .expect("counter recorded");
        assert_eq!(entry.1, Some(Unit::Count));
        assert!(matches!(entry.3, DebugValue::Counter(2)));
    }
}
