//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming for the gateway and
//! the sync worker.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Borrowed Brain metrics
pub const METRICS_PREFIX: &str = "borrowedbrain";

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

    // Sync pipeline metrics
    describe_counter!(
        format!("{}_syncs_triggered_total", METRICS_PREFIX),
        Unit::Count,
        "Total sync jobs triggered"
    );

    describe_counter!(
        format!("{}_syncs_deduplicated_total", METRICS_PREFIX),
        Unit::Count,
        "Sync requests satisfied by the dedup short-circuit"
    );

    describe_counter!(
        format!("{}_syncs_completed_total", METRICS_PREFIX),
        Unit::Count,
        "Sync jobs that reached synced"
    );

    describe_counter!(
        format!("{}_syncs_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Sync jobs that failed"
    );

    describe_histogram!(
        format!("{}_sync_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end sync processing latency in seconds"
    );

    describe_counter!(
        format!("{}_chunks_upserted_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks upserted into the vector store"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    // Chat metrics
    describe_counter!(
        format!("{}_chat_messages_total", METRICS_PREFIX),
        Unit::Count,
        "Total chat messages answered"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Vector retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_results_count", METRICS_PREFIX),
        Unit::Count,
        "Number of chunks returned from retrieval"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
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

/// Record a sync trigger decision
pub fn record_sync_trigger(deduplicated: bool) {
    if deduplicated {
        counter!(format!("{}_syncs_deduplicated_total", METRICS_PREFIX)).increment(1);
    } else {
        counter!(format!("{}_syncs_triggered_total", METRICS_PREFIX)).increment(1);
    }
}

/// Record a completed or failed sync run
pub fn record_sync_run(duration_secs: f64, chunks: usize, source: &str, success: bool) {
    if success {
        counter!(
            format!("{}_syncs_completed_total", METRICS_PREFIX),
            "source" => source.to_string()
        )
        .increment(1);

        counter!(format!("{}_chunks_upserted_total", METRICS_PREFIX)).increment(chunks as u64);

        histogram!(
            format!("{}_sync_duration_seconds", METRICS_PREFIX),
            "source" => source.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(format!("{}_syncs_failed_total", METRICS_PREFIX)).increment(1);
    }
}

/// Record a chat retrieval pass
pub fn record_retrieval(duration_secs: f64, result_count: usize) {
    counter!(format!("{}_chat_messages_total", METRICS_PREFIX)).increment(1);

    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_retrieval_results_count", METRICS_PREFIX)).set(result_count as f64);
}

/// Record a cache lookup
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("POST", "/v1/episodes/sync");
        std::thread::sleep(std::time::Duration::from_millis(5));
        metrics.finish(202);
        // Just verify it runs without panic
    }

    #[test]
    fn test_record_helpers_do_not_panic() {
        record_sync_trigger(true);
        record_sync_trigger(false);
        record_sync_run(1.5, 12, "catalog", true);
        record_sync_run(0.5, 0, "speech_to_text", false);
        record_retrieval(0.02, 5);
        record_cache(true, "catalog_search");
    }
}
