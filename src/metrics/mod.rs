//! Metrics collection for observability

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_vec_with_registry, Counter, CounterVec,
    Gauge, HistogramVec, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Assimilation pipeline
    pub assimilations: CounterVec,
    pub assimilation_stage_failures: CounterVec,
    pub assimilation_duration: HistogramVec,

    // Lookup pipeline
    pub lookups: CounterVec,
    pub lookup_duration: HistogramVec,

    // Vector index
    pub index_failures: Counter,
    pub index_retry_successes: Counter,
    pub index_queue_depth: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let assimilations = register_counter_vec_with_registry!(
            Opts::new("assimilations_total", "Total assimilation requests"),
            &["status"],
            registry
        )?;

        let assimilation_stage_failures = register_counter_vec_with_registry!(
            Opts::new(
                "assimilation_stage_failures_total",
                "Assimilation failures by pipeline stage"
            ),
            &["stage"],
            registry
        )?;

        let assimilation_duration = register_histogram_vec_with_registry!(
            "assimilation_duration_seconds",
            "Assimilation request duration in seconds",
            &["stage"],
            registry
        )?;

        let lookups = register_counter_vec_with_registry!(
            Opts::new("lookups_total", "Total lookup requests"),
            &["status", "mode"],
            registry
        )?;

        let lookup_duration = register_histogram_vec_with_registry!(
            "lookup_duration_seconds",
            "Lookup request duration in seconds",
            &["mode"],
            registry
        )?;

        let index_failures = register_counter_with_registry!(
            Opts::new("index_failures_total", "Vector index write failures"),
            registry
        )?;

        let index_retry_successes = register_counter_with_registry!(
            Opts::new(
                "index_retry_successes_total",
                "Deferred index jobs completed by the reconciler"
            ),
            registry
        )?;

        let index_queue_depth = register_gauge_with_registry!(
            Opts::new("index_queue_depth", "Pending deferred index jobs"),
            registry
        )?;

        Ok(Self {
            registry,
            assimilations,
            assimilation_stage_failures,
            assimilation_duration,
            lookups,
            lookup_duration,
            index_failures,
            index_retry_successes,
            index_queue_depth,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_assimilation(&self, success: bool) {
        let status = if success { "success" } else { "error" };
        self.assimilations.with_label_values(&[status]).inc();
    }

    pub fn record_stage_failure(&self, stage: &str) {
        self.assimilation_stage_failures
            .with_label_values(&[stage])
            .inc();
    }

    pub fn record_lookup(&self, success: bool, semantic: bool) {
        let status = if success { "success" } else { "error" };
        let mode = if semantic { "semantic" } else { "graph" };
        self.lookups.with_label_values(&[status, mode]).inc();
    }

    pub fn record_index_failure(&self) {
        self.index_failures.inc();
    }

    pub fn record_index_retry_success(&self) {
        self.index_retry_successes.inc();
    }

    pub fn set_index_queue_depth(&self, depth: usize) {
        self.index_queue_depth.set(depth as f64);
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_pipeline_events() {
        let metrics = Metrics::new().unwrap();
        metrics.record_assimilation(true);
        metrics.record_stage_failure("extracting");
        metrics.record_lookup(true, false);
        metrics.record_index_failure();
        metrics.set_index_queue_depth(3);
        // Recording must not panic.
    }

    #[test]
    fn test_export_contains_registered_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_assimilation(true);
        let text = metrics.export_prometheus();
        assert!(text.contains("assimilations_total"));
    }
}
