//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with latency-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::{Duration, Instant};

/// Metrics prefix for all FinGraph metrics
pub const METRICS_PREFIX: &str = "fingraph";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s, language model ceiling
];

/// Buckets for upstream calls (market providers, language model)
pub const UPSTREAM_BUCKETS: &[f64] = &[0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 30.00];

/// Bucket layout per latency histogram, for the exporter
pub fn histogram_buckets() -> Vec<(String, &'static [f64])> {
    vec![
        (format!("{}_request_duration_seconds", METRICS_PREFIX), LATENCY_BUCKETS),
        (format!("{}_query_duration_seconds", METRICS_PREFIX), LATENCY_BUCKETS),
        (format!("{}_provider_duration_seconds", METRICS_PREFIX), UPSTREAM_BUCKETS),
        (format!("{}_llm_duration_seconds", METRICS_PREFIX), UPSTREAM_BUCKETS),
    ]
}

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Chat pipeline metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total chat queries, labelled by whether the graph grounded them"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end chat query latency in seconds"
    );

    describe_histogram!(
        format!("{}_query_entities", METRICS_PREFIX),
        Unit::Count,
        "Concepts recognised per query"
    );

    // Inference metrics
    describe_counter!(
        format!("{}_inference_runs_total", METRICS_PREFIX),
        Unit::Count,
        "Forward-chaining runs"
    );

    describe_counter!(
        format!("{}_inference_derived_total", METRICS_PREFIX),
        Unit::Count,
        "Facts derived by inference"
    );

    describe_counter!(
        format!("{}_inference_budget_exceeded_total", METRICS_PREFIX),
        Unit::Count,
        "Inference runs stopped by the iteration or fact budget"
    );

    // Market data metrics
    describe_counter!(
        format!("{}_provider_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Market data provider attempts by outcome"
    );

    describe_histogram!(
        format!("{}_provider_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Market data provider latency in seconds"
    );

    describe_counter!(
        format!("{}_cache_lookups_total", METRICS_PREFIX),
        Unit::Count,
        "Quote cache lookups by outcome (hit, stale, miss)"
    );

    // Language model metrics
    describe_counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Language model requests"
    );

    describe_histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Language model latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record one forward-chaining run
pub fn record_inference(iterations: usize, derived: usize, budget_exceeded: bool) {
    counter!(format!("{}_inference_runs_total", METRICS_PREFIX)).increment(1);
    counter!(format!("{}_inference_derived_total", METRICS_PREFIX)).increment(derived as u64);

    if budget_exceeded {
        counter!(format!("{}_inference_budget_exceeded_total", METRICS_PREFIX)).increment(1);
    }

    tracing::trace!(iterations, derived, budget_exceeded, "Inference recorded");
}

/// Record a quote cache lookup; `outcome` is `hit`, `stale` or `miss`
pub fn record_cache(outcome: &str, kind: &str) {
    counter!(
        format!("{}_cache_lookups_total", METRICS_PREFIX),
        "outcome" => outcome.to_string(),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record one market data provider attempt
pub fn record_provider(provider: &str, outcome: &str, duration: Duration) {
    counter!(
        format!("{}_provider_requests_total", METRICS_PREFIX),
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_provider_duration_seconds", METRICS_PREFIX),
        "provider" => provider.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a completed chat query
pub fn record_query(duration: Duration, entities: usize, used_kg: bool) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "used_kg" => used_kg.to_string()
    )
    .increment(1);

    histogram!(format!("{}_query_duration_seconds", METRICS_PREFIX)).record(duration.as_secs_f64());
    histogram!(format!("{}_query_entities", METRICS_PREFIX)).record(entities as f64);
}

/// Record a language model call
pub fn record_llm(model: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_llm_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration.as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, UPSTREAM_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_every_latency_histogram_has_buckets() {
        let names: Vec<String> = histogram_buckets().into_iter().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec![
                "fingraph_request_duration_seconds",
                "fingraph_query_duration_seconds",
                "fingraph_provider_duration_seconds",
                "fingraph_llm_duration_seconds",
            ]
        );
    }

    #[test]
    fn test_recorders_without_exporter() {
        // no recorder installed; every helper must be a no-op
        let metrics = RequestMetrics::start("GET", "/v1/market");
        metrics.finish(200);
        record_inference(3, 5, false);
        record_cache("hit", "stock");
        record_provider("yahoo_finance", "success", Duration::from_millis(20));
        record_query(Duration::from_millis(40), 2, true);
        record_llm("offline", true, Duration::from_millis(1));
    }
}
