//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with standardized naming conventions.
//! Every helper goes through the `metrics` facade; without an installed
//! recorder they are no-ops.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all CiteForge metrics
pub const METRICS_PREFIX: &str = "citeforge";

/// Buckets for end-to-end answer latency (in seconds)
pub const ANSWER_BUCKETS: &[f64] = &[
    0.5,  // 500ms
    1.0,  // 1s
    2.0,  // 2s
    5.0,  // 5s
    10.0, // 10s
    20.0, // 20s
    30.0, // 30s
    60.0, // 1m
    120.0, // 2m
];

/// Buckets for retrieval latency (expansion + embedding + lookups)
pub const FUSION_BUCKETS: &[f64] = &[
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.000, // 2s
    5.000, // 5s
    10.00, // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Answer requests by terminal status"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Retrieval metrics
    describe_histogram!(
        format!("{}_fusion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Evidence fusion latency in seconds"
    );

    describe_histogram!(
        format!("{}_evidence_chunks", METRICS_PREFIX),
        Unit::Count,
        "Evidence chunks handed to answer generation"
    );

    describe_counter!(
        format!("{}_embedding_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Failed query embeddings"
    );

    describe_counter!(
        format!("{}_lookup_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Failed vector index lookups"
    );

    // Answer metrics
    describe_counter!(
        format!("{}_citation_indices_dropped_total", METRICS_PREFIX),
        Unit::Count,
        "Out-of-range citation indices removed from answers"
    );

    describe_counter!(
        format!("{}_streamed_fragments_total", METRICS_PREFIX),
        Unit::Count,
        "Answer fragments relayed to clients"
    );

    describe_histogram!(
        format!("{}_answer_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Answer streaming latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: &'static str,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(endpoint: &'static str) -> Self {
        Self {
            start: Instant::now(),
            endpoint,
        }
    }

    /// Record request completion with its terminal status
    pub fn finish(self, status: &'static str) {
        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "endpoint" => self.endpoint,
            "status" => status
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "endpoint" => self.endpoint
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

/// Helper to record evidence fusion metrics
pub fn record_fusion(duration_secs: f64, query_count: usize, evidence_count: usize) {
    histogram!(
        format!("{}_fusion_duration_seconds", METRICS_PREFIX),
        "queries" => query_count.to_string()
    )
    .record(duration_secs);

    histogram!(format!("{}_evidence_chunks", METRICS_PREFIX)).record(evidence_count as f64);
}

/// Helper to record failed embedding calls
pub fn record_embedding_failures(model: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        format!("{}_embedding_failures_total", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .increment(count as u64);
}

/// Helper to record failed index lookups
pub fn record_lookup_failures(provider: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        format!("{}_lookup_failures_total", METRICS_PREFIX),
        "provider" => provider.to_string()
    )
    .increment(count as u64);
}

/// Helper to record dropped citation indices
pub fn record_dropped_citations(count: usize) {
    counter!(format!("{}_citation_indices_dropped_total", METRICS_PREFIX)).increment(count as u64);
}

/// Helper to record answer streaming metrics
pub fn record_answer(duration_secs: f64, fragments: usize, outcome: &'static str) {
    counter!(format!("{}_streamed_fragments_total", METRICS_PREFIX)).increment(fragments as u64);

    histogram!(
        format!("{}_answer_duration_seconds", METRICS_PREFIX),
        "outcome" => outcome
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [ANSWER_BUCKETS, FUSION_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_helpers_without_recorder() {
        let metrics = RequestMetrics::start("/query-stream");
        record_fusion(0.2, 3, 25);
        record_embedding_failures("text-embedding-3-small", 1);
        record_lookup_failures("memory", 0);
        record_dropped_citations(2);
        record_answer(1.5, 40, "completed");
        metrics.finish("done");
        // Just verify it runs without panic
    }
}
