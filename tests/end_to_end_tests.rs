use std::sync::Arc;

use telemetry::config::{LimitsConfig, ManagerConfig};
use telemetry::core::{AggregationFunction, AggregationPeriod, Labels, ManualClock, MetricType};
use telemetry::exporter::{ExportFormat, ExportOptions};
use telemetry::{MetricsManager, RegisterMetric};

const T: i64 = 1_700_000_000_000;

fn manager_at(start: i64) -> (MetricsManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start));
    let config = ManagerConfig {
        enable_auto_collection: false,
        ..Default::default()
    };
    let manager = MetricsManager::with_clock(config, LimitsConfig::default(), clock.clone());
    (manager, clock)
}

#[test]
fn gauge_round_trips_through_json_export() {
    let (manager, clock) = manager_at(T);
    manager
        .register_metric(
            "temp",
            MetricType::Gauge,
            "Room temperature",
            RegisterMetric::default().with_unit("C"),
        )
        .unwrap();

    manager.set_gauge("temp", 20.0, Labels::new()).unwrap();
    clock.advance(1_000);
    manager.set_gauge("temp", 25.0, Labels::new()).unwrap();
    assert_eq!(manager.get_gauge_value("temp"), 25.0);

    let result = manager
        .export_metrics(&["temp"], &ExportOptions::new(ExportFormat::Json))
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&result.content).unwrap();
    let entries = parsed.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["unit"], "C");

    let values = entries[0]["values"].as_array().unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[1]["value"], 25.0);
}

#[test]
fn histogram_buckets_and_stats() {
    let (manager, _) = manager_at(T);
    manager
        .register_metric("latency", MetricType::Histogram, "Request latency", RegisterMetric::default())
        .unwrap();
    for v in [3.0, 7.0, 15.0] {
        manager.observe_histogram("latency", v, Labels::new()).unwrap();
    }

    let stats = manager.get_histogram_stats("latency").unwrap();
    assert_eq!(stats.sum, 25.0);
    assert_eq!(stats.count, 3);
    assert!((stats.average - 25.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.bucket(5.0), 1);
    assert_eq!(stats.bucket(10.0), 1);
    assert_eq!(stats.bucket(20.0), 1);
    assert_eq!(stats.bucket(1.0), 0);
}

#[test]
fn hourly_average_over_explicit_window() {
    let (manager, clock) = manager_at(T - 30_000);
    for v in [10.0, 20.0, 30.0] {
        manager.set_gauge("load", v, Labels::new()).unwrap();
        clock.advance(10_000);
    }

    let result = manager
        .aggregate("load", AggregationPeriod::OneHour, AggregationFunction::Average, Some(T))
        .unwrap();
    assert_eq!(result.value, 20.0);
    assert_eq!(result.sample_count, 3);
    assert_eq!(result.start_time, T - 3_600_000);
    assert_eq!(result.end_time, T);
}

#[test]
fn increasing_rolling_averages_are_detected() {
    let (manager, clock) = manager_at(T + 30_000);
    // one sample in the middle of each of five consecutive minutes
    for v in 1..=5 {
        manager.set_gauge("queue_depth", f64::from(v), Labels::new()).unwrap();
        clock.advance(60_000);
    }
    clock.set(T + 300_000);

    let analysis = manager
        .analyze_trend("queue_depth", AggregationPeriod::OneMinute, AggregationFunction::Average, 5)
        .unwrap();
    let averages: Vec<f64> = analysis.aggregations.iter().map(|a| a.value).collect();
    assert_eq!(averages, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(analysis.trend.as_str(), "increasing");
    assert!(analysis.slope > 0.1);
}

#[test]
fn counter_equals_sum_of_deltas_since_reset() {
    let (manager, _) = manager_at(T);
    for delta in [1.0, 2.5, 4.0] {
        manager.increment_counter("requests_total", delta, Labels::new()).unwrap();
    }
    assert_eq!(manager.get_counter_value("requests_total"), 7.5);

    manager.reset_metric("requests_total");
    manager.increment_counter("requests_total", 2.0, Labels::new()).unwrap();
    assert_eq!(manager.get_counter_value("requests_total"), 2.0);
}

#[test]
fn missing_values_default_to_zero() {
    let (manager, _) = manager_at(T);
    assert_eq!(manager.get_counter_value("nope"), 0.0);
    assert_eq!(manager.get_gauge_value("nope"), 0.0);
    assert!(manager.get_histogram_stats("nope").is_none());
}

#[test]
fn prometheus_export_has_help_and_type() {
    let (manager, _) = manager_at(T);
    manager
        .register_metric("requests_total", MetricType::Counter, "Total requests", RegisterMetric::default())
        .unwrap();
    manager.increment_counter("requests_total", 1.0, Labels::new()).unwrap();

    let result = manager.export(&ExportOptions::new(ExportFormat::Prometheus)).unwrap();
    assert!(result.content.contains("# HELP requests_total Total requests"));
    assert!(result.content.contains("# TYPE requests_total counter"));
}
