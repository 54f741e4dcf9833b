use tracing::{debug, info, warn};

use telemetry_core::MetricType;

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_metric_registered(name: &str, metric_type: MetricType, category: Option<&str>) {
        info!(
            event = "metric_registered",
            metric.name = name,
            metric.type = %metric_type,
            metric.category = category.unwrap_or("-"),
            "Metric registered"
        );
    }

    pub fn log_metric_auto_registered(name: &str, metric_type: MetricType) {
        debug!(
            event = "metric_auto_registered",
            metric.name = name,
            metric.type = %metric_type,
            "Metric auto-registered on first use"
        );
    }

    pub fn log_type_mismatch(name: &str, expected: MetricType, actual: MetricType) {
        warn!(
            event = "metric_type_mismatch",
            metric.name = name,
            metric.expected_type = %expected,
            metric.actual_type = %actual,
            "Metric recorded under the wrong type"
        );
    }

    pub fn log_export_completed(format: &str, metric_count: usize, bytes: usize, duration_ms: u64) {
        info!(
            event = "export_completed",
            export.format = format,
            export.metric_count = metric_count,
            export.bytes = bytes,
            export.duration_ms = duration_ms,
            "Metrics exported"
        );
    }

    pub fn log_trend_detected(name: &str, trend: &str, slope: f64, data_points: usize) {
        info!(
            event = "trend_detected",
            metric.name = name,
            trend.direction = trend,
            trend.slope = slope,
            trend.data_points = data_points,
            "Trend analysis completed"
        );
    }

    pub fn log_widget_refresh_failed(widget_id: &str, metric_name: &str, error: &str) {
        warn!(
            event = "widget_refresh_failed",
            widget.id = widget_id,
            widget.metric = metric_name,
            widget.error = error,
            "Dashboard widget refresh failed"
        );
    }

    pub fn log_collection_cycle(probe_count: usize, duration_ms: u64) {
        debug!(
            event = "collection_cycle",
            collection.probes = probe_count,
            collection.duration_ms = duration_ms,
            "Auto collection cycle finished"
        );
    }

    pub fn log_probe_failed(probe: &str, error: &str) {
        warn!(
            event = "probe_failed",
            probe.name = probe,
            probe.error = error,
            "Metric probe failed"
        );
    }

    pub fn log_manager_disposed(metric_count: usize, task_count: usize) {
        info!(
            event = "manager_disposed",
            manager.metric_count = metric_count,
            manager.cancelled_tasks = task_count,
            "Metrics manager disposed"
        );
    }
}
