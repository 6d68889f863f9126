//! Observability for inventory runs
//!
//! Provides:
//! - Prometheus counters (upstream calls, cache lookups, records, cluster outcomes)
//! - Structured logging of run-level events with tracing

use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for per-cluster processing time (in seconds)
const CLUSTER_DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<InventoryMetricsInner> = OnceLock::new();

struct InventoryMetricsInner {
    upstream_calls: IntCounterVec,
    service_cache_lookups: IntCounterVec,
    capacity_provider_cache_lookups: IntCounterVec,
    records_written: IntCounterVec,
    records_skipped: IntCounterVec,
    metric_gaps: IntCounterVec,
    clusters: IntCounterVec,
    cluster_duration_seconds: Histogram,
}

impl InventoryMetricsInner {
    fn new() -> Self {
        Self {
            upstream_calls: register_int_counter_vec!(
                "fleet_inventory_upstream_calls_total",
                "Upstream API calls issued, by operation",
                &["operation"]
            )
            .expect("Failed to register upstream_calls_total"),

            service_cache_lookups: register_int_counter_vec!(
                "fleet_inventory_service_cache_lookups_total",
                "Service detail lookups, by cache result",
                &["result"]
            )
            .expect("Failed to register service_cache_lookups_total"),

            capacity_provider_cache_lookups: register_int_counter_vec!(
                "fleet_inventory_capacity_provider_cache_lookups_total",
                "Capacity provider lookups, by cache result",
                &["result"]
            )
            .expect("Failed to register capacity_provider_cache_lookups_total"),

            records_written: register_int_counter_vec!(
                "fleet_inventory_records_written_total",
                "Report rows written, by report",
                &["report"]
            )
            .expect("Failed to register records_written_total"),

            records_skipped: register_int_counter_vec!(
                "fleet_inventory_records_skipped_total",
                "Records dropped as incomplete, by report",
                &["report"]
            )
            .expect("Failed to register records_skipped_total"),

            metric_gaps: register_int_counter_vec!(
                "fleet_inventory_metric_gaps_total",
                "Utilization queries that returned no datapoints, by metric",
                &["metric"]
            )
            .expect("Failed to register metric_gaps_total"),

            clusters: register_int_counter_vec!(
                "fleet_inventory_clusters_total",
                "Clusters processed, by outcome",
                &["outcome"]
            )
            .expect("Failed to register clusters_total"),

            cluster_duration_seconds: register_histogram!(
                "fleet_inventory_cluster_duration_seconds",
                "Time spent producing both reports of one cluster",
                CLUSTER_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register cluster_duration_seconds"),
        }
    }
}

/// Run metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same counters.
#[derive(Clone)]
pub struct InventoryMetrics {
    _private: (),
}

impl Default for InventoryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(InventoryMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &InventoryMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn inc_upstream_call(&self, operation: &str) {
        self.inner()
            .upstream_calls
            .with_label_values(&[operation])
            .inc();
    }

    pub fn inc_service_cache(&self, hit: bool) {
        self.inner()
            .service_cache_lookups
            .with_label_values(&[cache_label(hit)])
            .inc();
    }

    pub fn inc_capacity_provider_cache(&self, hit: bool) {
        self.inner()
            .capacity_provider_cache_lookups
            .with_label_values(&[cache_label(hit)])
            .inc();
    }

    pub fn add_records_written(&self, report: &str, count: usize) {
        self.inner()
            .records_written
            .with_label_values(&[report])
            .inc_by(count as u64);
    }

    pub fn inc_records_skipped(&self, report: &str) {
        self.inner()
            .records_skipped
            .with_label_values(&[report])
            .inc();
    }

    pub fn inc_metric_gap(&self, metric: &str) {
        self.inner().metric_gaps.with_label_values(&[metric]).inc();
    }

    pub fn inc_cluster_outcome(&self, outcome: &str) {
        self.inner().clusters.with_label_values(&[outcome]).inc();
    }

    pub fn observe_cluster_duration(&self, duration_secs: f64) {
        self.inner().cluster_duration_seconds.observe(duration_secs);
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

fn cache_label(hit: bool) -> &'static str {
    if hit {
        "hit"
    } else {
        "miss"
    }
}

/// Structured logger for run-level events
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_run_start(&self, cluster_count: usize) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            clusters = cluster_count,
            "Gathering fleet inventory"
        );
    }

    pub fn log_cluster_start(&self, cluster_arn: &str, short_name: &str) {
        info!(
            event = "cluster_started",
            run_id = %self.run_id,
            cluster = %cluster_arn,
            short_name = %short_name,
            "Gathering data for cluster"
        );
    }

    pub fn log_report_written(&self, cluster_arn: &str, report: &str, path: &str, rows: usize, columns: usize) {
        info!(
            event = "report_written",
            run_id = %self.run_id,
            cluster = %cluster_arn,
            report = %report,
            path = %path,
            rows = rows,
            columns = columns,
            "Report written"
        );
    }

    pub fn log_record_skipped(&self, cluster_arn: &str, report: &str, reason: &str) {
        warn!(
            event = "record_skipped",
            run_id = %self.run_id,
            cluster = %cluster_arn,
            report = %report,
            reason = %reason,
            "Incomplete record skipped"
        );
    }

    pub fn log_cluster_failed(&self, cluster_arn: &str, error: &str) {
        warn!(
            event = "cluster_failed",
            run_id = %self.run_id,
            cluster = %cluster_arn,
            error = %error,
            "Cluster inventory failed, no reports written for it"
        );
    }

    pub fn log_run_complete(&self, written: usize, failed: usize, elapsed_secs: f64) {
        if failed == 0 {
            info!(
                event = "run_completed",
                run_id = %self.run_id,
                clusters_written = written,
                clusters_failed = failed,
                elapsed_secs = elapsed_secs,
                "Fleet inventory complete"
            );
        } else {
            warn!(
                event = "run_completed",
                run_id = %self.run_id,
                clusters_written = written,
                clusters_failed = failed,
                elapsed_secs = elapsed_secs,
                "Fleet inventory complete with failed clusters"
            );
        }
    }
}
