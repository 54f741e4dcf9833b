use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use telemetry_core::stats::{locate_bucket, nearest_rank, sorted_copy, HISTOGRAM_BOUNDARIES};
use telemetry_core::{
    BoundedBuffer, Clock, Labels, Metric, MetricType, MetricValue, SystemClock, TelemetryError,
    TelemetryResult, DEFAULT_MAX_SUMMARY_SAMPLES, DEFAULT_MAX_VALUES,
};

/// Retention limits applied to every metric the collector owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorLimits {
    pub max_values_per_metric: usize,
    pub max_summary_samples: usize,
}

impl Default for CollectorLimits {
    fn default() -> Self {
        Self {
            max_values_per_metric: DEFAULT_MAX_VALUES,
            max_summary_samples: DEFAULT_MAX_SUMMARY_SAMPLES,
        }
    }
}

/// Optional attributes for an explicit registration.
#[derive(Debug, Clone, Default)]
pub struct MetricOptions {
    pub labels: Vec<String>,
    pub unit: String,
}

impl MetricOptions {
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// Whether a record call found its metric or had to create it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Created,
    Existing,
}

impl Registration {
    pub fn is_created(&self) -> bool {
        matches!(self, Registration::Created)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramStats {
    pub sum: f64,
    pub count: u64,
    pub average: f64,
    /// `(upper_bound, count)` for every bucket that received an observation.
    pub buckets: Vec<(f64, u64)>,
}

impl HistogramStats {
    /// Observations counted under `upper_bound`; zero for untouched buckets.
    pub fn bucket(&self, upper_bound: f64) -> u64 {
        self.buckets
            .iter()
            .find(|(bound, _)| *bound == upper_bound)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub sum: f64,
    pub count: u64,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Percentiles,
}

#[derive(Debug, Clone)]
struct HistogramState {
    buckets: [u64; HISTOGRAM_BOUNDARIES.len()],
    sum: f64,
    count: u64,
}

impl HistogramState {
    fn new() -> Self {
        Self {
            buckets: [0; HISTOGRAM_BOUNDARIES.len()],
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        let idx = locate_bucket(&HISTOGRAM_BOUNDARIES, value);
        self.buckets[idx] += 1;
        self.sum += value;
        self.count += 1;
    }

    fn stats(&self) -> HistogramStats {
        let buckets = HISTOGRAM_BOUNDARIES
            .iter()
            .zip(self.buckets.iter())
            .filter(|(_, count)| **count > 0)
            .map(|(bound, count)| (*bound, *count))
            .collect();
        HistogramStats {
            sum: self.sum,
            count: self.count,
            average: average(self.sum, self.count),
            buckets,
        }
    }
}

#[derive(Debug, Clone)]
struct SummaryState {
    samples: BoundedBuffer<f64>,
    sum: f64,
    count: u64,
}

impl SummaryState {
    fn new(max_samples: usize) -> Self {
        Self {
            samples: BoundedBuffer::new(max_samples),
            sum: 0.0,
            count: 0,
        }
    }

    fn observe(&mut self, value: f64) {
        self.samples.push(value);
        self.sum += value;
        self.count += 1;
    }

    fn stats(&self) -> SummaryStats {
        let sorted = sorted_copy(&self.samples);
        SummaryStats {
            sum: self.sum,
            count: self.count,
            average: average(self.sum, self.count),
            min: sorted.first().copied().unwrap_or(0.0),
            max: sorted.last().copied().unwrap_or(0.0),
            percentiles: Percentiles {
                p50: nearest_rank(&sorted, 0.50),
                p75: nearest_rank(&sorted, 0.75),
                p90: nearest_rank(&sorted, 0.90),
                p95: nearest_rank(&sorted, 0.95),
                p99: nearest_rank(&sorted, 0.99),
            },
        }
    }
}

#[derive(Debug, Clone)]
enum MetricState {
    Counter(f64),
    Gauge(f64),
    Histogram(HistogramState),
    Summary(SummaryState),
}

#[derive(Debug, Clone, Copy)]
enum Update {
    Add(f64),
    Set(f64),
    Observe(f64),
}

impl MetricState {
    fn zero(metric_type: MetricType, limits: &CollectorLimits) -> Self {
        match metric_type {
            MetricType::Counter => MetricState::Counter(0.0),
            MetricType::Gauge => MetricState::Gauge(0.0),
            MetricType::Histogram => MetricState::Histogram(HistogramState::new()),
            MetricType::Summary => MetricState::Summary(SummaryState::new(limits.max_summary_samples)),
        }
    }

    /// Applies `update` and returns the value that goes into the series:
    /// the new accumulator for counters and gauges, the raw observation otherwise.
    fn apply(&mut self, update: Update) -> f64 {
        match (self, update) {
            (MetricState::Counter(total), Update::Add(delta)) => {
                *total += delta;
                *total
            }
            (MetricState::Gauge(current), Update::Add(delta)) => {
                *current += delta;
                *current
            }
            (MetricState::Gauge(current), Update::Set(value)) => {
                *current = value;
                *current
            }
            (MetricState::Histogram(histogram), Update::Observe(value)) => {
                histogram.observe(value);
                value
            }
            (MetricState::Summary(summary), Update::Observe(value)) => {
                summary.observe(value);
                value
            }
            // get_or_create rejects mismatched types before we get here.
            (_, Update::Add(v) | Update::Set(v) | Update::Observe(v)) => v,
        }
    }
}

#[derive(Debug, Clone)]
struct MetricEntry {
    metric: Metric,
    state: MetricState,
    last_updated: Option<DateTime<Utc>>,
}

/// Owns the numeric state and bounded series of every metric.
pub struct MetricsCollector {
    metrics: HashMap<String, MetricEntry>,
    order: Vec<String>,
    limits: CollectorLimits,
    clock: Arc<dyn Clock>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_limits(CollectorLimits::default())
    }

    pub fn with_limits(limits: CollectorLimits) -> Self {
        Self {
            metrics: HashMap::new(),
            order: Vec::new(),
            limits,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn limits(&self) -> CollectorLimits {
        self.limits
    }

    pub fn register_metric(
        &mut self,
        name: &str,
        metric_type: MetricType,
        description: &str,
        options: MetricOptions,
    ) -> TelemetryResult<()> {
        if self.metrics.contains_key(name) {
            return Err(TelemetryError::duplicate(name));
        }
        let metric = Metric::new(name, metric_type, description, self.limits.max_values_per_metric)
            .with_unit(options.unit)
            .with_labels(options.labels);
        self.insert(metric);
        debug!(metric_name = name, metric_type = %metric_type, "Metric registered");
        Ok(())
    }

    /// Returns the existing metric's registration, or creates it with a default
    /// description. Fails if `name` exists under another type.
    pub fn get_or_create(&mut self, name: &str, metric_type: MetricType) -> TelemetryResult<Registration> {
        if let Some(entry) = self.metrics.get(name) {
            if entry.metric.metric_type != metric_type {
                warn!(
                    metric_name = name,
                    expected = %metric_type,
                    actual = %entry.metric.metric_type,
                    "Metric type mismatch"
                );
                return Err(TelemetryError::type_mismatch(
                    name,
                    metric_type,
                    entry.metric.metric_type,
                ));
            }
            return Ok(Registration::Existing);
        }

        let description = format!("Auto-registered {metric_type} metric");
        let metric = Metric::new(name, metric_type, description, self.limits.max_values_per_metric);
        self.insert(metric);
        debug!(metric_name = name, metric_type = %metric_type, "Metric auto-registered");
        Ok(Registration::Created)
    }

    /// Adds `delta` to a counter. Negative deltas are accepted and logged.
    pub fn increment_counter(&mut self, name: &str, delta: f64, labels: Labels) -> TelemetryResult<Registration> {
        if delta < 0.0 {
            warn!(metric_name = name, delta, "Negative counter delta");
        }
        self.record(name, MetricType::Counter, Update::Add(delta), labels)
    }

    pub fn set_gauge(&mut self, name: &str, value: f64, labels: Labels) -> TelemetryResult<Registration> {
        self.record(name, MetricType::Gauge, Update::Set(value), labels)
    }

    pub fn increment_gauge(&mut self, name: &str, delta: f64, labels: Labels) -> TelemetryResult<Registration> {
        self.record(name, MetricType::Gauge, Update::Add(delta), labels)
    }

    pub fn decrement_gauge(&mut self, name: &str, delta: f64, labels: Labels) -> TelemetryResult<Registration> {
        self.record(name, MetricType::Gauge, Update::Add(-delta), labels)
    }

    pub fn observe_histogram(&mut self, name: &str, value: f64, labels: Labels) -> TelemetryResult<Registration> {
        self.record(name, MetricType::Histogram, Update::Observe(value), labels)
    }

    pub fn observe_summary(&mut self, name: &str, value: f64, labels: Labels) -> TelemetryResult<Registration> {
        self.record(name, MetricType::Summary, Update::Observe(value), labels)
    }

    pub fn get_metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name).map(|entry| &entry.metric)
    }

    /// All metrics in registration order.
    pub fn get_all_metrics(&self) -> Vec<&Metric> {
        self.order
            .iter()
            .filter_map(|name| self.metrics.get(name))
            .map(|entry| &entry.metric)
            .collect()
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn has_metric(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    /// Wall-clock time of the most recent record call on `name`.
    pub fn last_updated(&self, name: &str) -> Option<DateTime<Utc>> {
        self.metrics.get(name).and_then(|entry| entry.last_updated)
    }

    /// 0 when the metric is absent or not a counter.
    pub fn get_counter_value(&self, name: &str) -> f64 {
        match self.metrics.get(name).map(|entry| &entry.state) {
            Some(MetricState::Counter(total)) => *total,
            _ => 0.0,
        }
    }

    /// 0 when the metric is absent or not a gauge.
    pub fn get_gauge_value(&self, name: &str) -> f64 {
        match self.metrics.get(name).map(|entry| &entry.state) {
            Some(MetricState::Gauge(current)) => *current,
            _ => 0.0,
        }
    }

    pub fn get_histogram_stats(&self, name: &str) -> Option<HistogramStats> {
        match self.metrics.get(name).map(|entry| &entry.state) {
            Some(MetricState::Histogram(histogram)) => Some(histogram.stats()),
            _ => None,
        }
    }

    pub fn get_summary_stats(&self, name: &str) -> Option<SummaryStats> {
        match self.metrics.get(name).map(|entry| &entry.state) {
            Some(MetricState::Summary(summary)) => Some(summary.stats()),
            _ => None,
        }
    }

    /// Zeroes the accumulator and drops recorded values, keeping the registration.
    /// Returns false when `name` is unknown.
    pub fn reset_metric(&mut self, name: &str) -> bool {
        let limits = self.limits;
        match self.metrics.get_mut(name) {
            Some(entry) => {
                entry.state = MetricState::zero(entry.metric.metric_type, &limits);
                entry.metric.values.clear();
                entry.last_updated = None;
                debug!(metric_name = name, "Metric reset");
                true
            }
            None => false,
        }
    }

    pub fn remove_metric(&mut self, name: &str) -> Option<Metric> {
        let entry = self.metrics.remove(name)?;
        self.order.retain(|n| n != name);
        Some(entry.metric)
    }

    pub fn clear(&mut self) {
        self.metrics.clear();
        self.order.clear();
    }

    pub fn get_metrics_count(&self) -> usize {
        self.metrics.len()
    }

    /// Recorded values across every metric.
    pub fn total_values(&self) -> usize {
        self.metrics.values().map(|entry| entry.metric.values.len()).sum()
    }

    fn insert(&mut self, metric: Metric) {
        let state = MetricState::zero(metric.metric_type, &self.limits);
        self.order.push(metric.name.clone());
        self.metrics.insert(
            metric.name.clone(),
            MetricEntry {
                metric,
                state,
                last_updated: None,
            },
        );
    }

    fn record(
        &mut self,
        name: &str,
        metric_type: MetricType,
        update: Update,
        labels: Labels,
    ) -> TelemetryResult<Registration> {
        let registration = self.get_or_create(name, metric_type)?;
        let timestamp = self.clock.now_millis();
        let entry = self
            .metrics
            .get_mut(name)
            .ok_or_else(|| TelemetryError::not_found(name))?;

        let recorded = entry.state.apply(update);
        entry.metric.record(MetricValue::new(recorded, timestamp, labels));
        entry.last_updated = DateTime::from_timestamp_millis(timestamp);
        Ok(registration)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn average(sum: f64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_core::ManualClock;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_register_duplicate_fails() {
        let mut collector = MetricsCollector::new();
        collector
            .register_metric("requests_total", MetricType::Counter, "Total requests", MetricOptions::default())
            .unwrap();
        let err = collector
            .register_metric("requests_total", MetricType::Counter, "again", MetricOptions::default())
            .unwrap_err();
        assert!(matches!(err, TelemetryError::DuplicateMetric { .. }));
        assert_eq!(collector.get_metrics_count(), 1);
    }

    #[test]
    fn test_counter_sums_deltas() {
        let mut collector = MetricsCollector::new();
        collector.increment_counter("hits", 1.0, Labels::new()).unwrap();
        collector.increment_counter("hits", 2.5, Labels::new()).unwrap();
        collector.increment_counter("hits", 4.0, labels(&[("route", "/a")])).unwrap();

        assert_eq!(collector.get_counter_value("hits"), 7.5);
        let metric = collector.get_metric("hits").unwrap();
        let series: Vec<f64> = metric.values.iter().map(|v| v.value).collect();
        assert_eq!(series, vec![1.0, 3.5, 7.5]);
        assert_eq!(metric.latest().unwrap().labels.get("route").unwrap(), "/a");
    }

    #[test]
    fn test_negative_counter_delta_is_permitted() {
        let mut collector = MetricsCollector::new();
        collector.increment_counter("balance", 5.0, Labels::new()).unwrap();
        collector.increment_counter("balance", -2.0, Labels::new()).unwrap();
        assert_eq!(collector.get_counter_value("balance"), 3.0);
    }

    #[test]
    fn test_auto_registration_is_tagged() {
        let mut collector = MetricsCollector::new();
        let first = collector.set_gauge("temp", 20.0, Labels::new()).unwrap();
        let second = collector.set_gauge("temp", 21.0, Labels::new()).unwrap();
        assert_eq!(first, Registration::Created);
        assert_eq!(second, Registration::Existing);
        assert_eq!(
            collector.get_metric("temp").unwrap().description,
            "Auto-registered gauge metric"
        );
    }

    #[test]
    fn test_type_mismatch() {
        let mut collector = MetricsCollector::new();
        collector.set_gauge("temp", 20.0, Labels::new()).unwrap();
        let err = collector.increment_counter("temp", 1.0, Labels::new()).unwrap_err();
        match err {
            TelemetryError::TypeMismatch { expected, actual, .. } => {
                assert_eq!(expected, MetricType::Counter);
                assert_eq!(actual, MetricType::Gauge);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(collector.get_metric("temp").unwrap().values.len(), 1);
    }

    #[test]
    fn test_gauge_set_increment_decrement() {
        let mut collector = MetricsCollector::new();
        collector.set_gauge("temp", 25.0, Labels::new()).unwrap();
        assert_eq!(collector.get_gauge_value("temp"), 25.0);

        collector.increment_gauge("temp", 0.3, Labels::new()).unwrap();
        collector.decrement_gauge("temp", 0.3, Labels::new()).unwrap();
        assert!((collector.get_gauge_value("temp") - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_values_default_to_zero() {
        let collector = MetricsCollector::new();
        assert_eq!(collector.get_counter_value("nope"), 0.0);
        assert_eq!(collector.get_gauge_value("nope"), 0.0);
        assert!(collector.get_histogram_stats("nope").is_none());
        assert!(collector.get_summary_stats("nope").is_none());
    }

    #[test]
    fn test_histogram_stats() {
        let mut collector = MetricsCollector::new();
        collector
            .register_metric("latency", MetricType::Histogram, "Latency", MetricOptions::default().with_unit("ms"))
            .unwrap();
        for v in [3.0, 7.0, 15.0] {
            collector.observe_histogram("latency", v, Labels::new()).unwrap();
        }

        let stats = collector.get_histogram_stats("latency").unwrap();
        assert_eq!(stats.sum, 25.0);
        assert_eq!(stats.count, 3);
        assert!((stats.average - 25.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.buckets, vec![(5.0, 1), (10.0, 1), (20.0, 1)]);
        assert_eq!(stats.bucket(10.0), 1);
        assert_eq!(stats.bucket(1.0), 0);
    }

    #[test]
    fn test_histogram_overflow_bucket() {
        let mut collector = MetricsCollector::new();
        collector.observe_histogram("big", 50_000.0, Labels::new()).unwrap();
        let stats = collector.get_histogram_stats("big").unwrap();
        assert_eq!(stats.bucket(f64::INFINITY), 1);
    }

    #[test]
    fn test_summary_stats() {
        let mut collector = MetricsCollector::new();
        for v in 1..=100 {
            collector.observe_summary("rt", f64::from(v), Labels::new()).unwrap();
        }
        let stats = collector.get_summary_stats("rt").unwrap();
        assert_eq!(stats.count, 100);
        assert_eq!(stats.sum, 5050.0);
        assert_eq!(stats.average, 50.5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 100.0);
        assert_eq!(stats.percentiles.p50, 50.0);
        assert_eq!(stats.percentiles.p75, 75.0);
        assert_eq!(stats.percentiles.p90, 90.0);
        assert_eq!(stats.percentiles.p95, 95.0);
        assert_eq!(stats.percentiles.p99, 99.0);
    }

    #[test]
    fn test_summary_sample_window_is_bounded() {
        let limits = CollectorLimits {
            max_values_per_metric: 100,
            max_summary_samples: 3,
        };
        let mut collector = MetricsCollector::with_limits(limits);
        for v in [100.0, 1.0, 2.0, 3.0] {
            collector.observe_summary("rt", v, Labels::new()).unwrap();
        }
        let stats = collector.get_summary_stats("rt").unwrap();
        // running totals cover every observation, the sample only the last three
        assert_eq!(stats.count, 4);
        assert_eq!(stats.sum, 106.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.min, 1.0);
    }

    #[test]
    fn test_value_history_is_bounded() {
        let limits = CollectorLimits {
            max_values_per_metric: 5,
            max_summary_samples: 5,
        };
        let mut collector = MetricsCollector::with_limits(limits);
        for _ in 0..12 {
            collector.increment_counter("c", 1.0, Labels::new()).unwrap();
        }
        let metric = collector.get_metric("c").unwrap();
        assert_eq!(metric.values.len(), 5);
        assert_eq!(metric.values.first().unwrap().value, 8.0);
        assert_eq!(collector.get_counter_value("c"), 12.0);
    }

    #[test]
    fn test_default_capacity() {
        let mut collector = MetricsCollector::new();
        for i in 0..10_005 {
            collector.set_gauge("g", f64::from(i), Labels::new()).unwrap();
        }
        let metric = collector.get_metric("g").unwrap();
        assert_eq!(metric.values.len(), 10_000);
        assert_eq!(metric.values.first().unwrap().value, 5.0);
    }

    #[test]
    fn test_timestamps_come_from_clock() {
        let clock = Arc::new(ManualClock::new(1_000));
        let mut collector = MetricsCollector::new().with_clock(clock.clone());
        collector.set_gauge("g", 1.0, Labels::new()).unwrap();
        clock.advance(250);
        collector.set_gauge("g", 2.0, Labels::new()).unwrap();

        let timestamps: Vec<i64> = collector
            .get_metric("g")
            .unwrap()
            .values
            .iter()
            .map(|v| v.timestamp)
            .collect();
        assert_eq!(timestamps, vec![1_000, 1_250]);
        assert_eq!(
            collector.last_updated("g").unwrap().timestamp_millis(),
            1_250
        );
    }

    #[test]
    fn test_reset_keeps_registration() {
        let mut collector = MetricsCollector::new();
        collector.observe_histogram("latency", 3.0, Labels::new()).unwrap();
        collector.increment_counter("hits", 3.0, Labels::new()).unwrap();

        assert!(collector.reset_metric("latency"));
        assert!(collector.reset_metric("hits"));
        assert!(!collector.reset_metric("unknown"));

        assert!(collector.has_metric("latency"));
        assert_eq!(collector.get_histogram_stats("latency").unwrap().count, 0);
        assert!(collector.get_metric("latency").unwrap().values.is_empty());
        assert_eq!(collector.get_counter_value("hits"), 0.0);
        assert_eq!(collector.get_metric("hits").unwrap().metric_type, MetricType::Counter);

        collector.increment_counter("hits", 2.0, Labels::new()).unwrap();
        assert_eq!(collector.get_counter_value("hits"), 2.0);
    }

    #[test]
    fn test_registration_order_and_clear() {
        let mut collector = MetricsCollector::new();
        collector.set_gauge("b", 1.0, Labels::new()).unwrap();
        collector.increment_counter("a", 1.0, Labels::new()).unwrap();
        collector.observe_summary("c", 1.0, Labels::new()).unwrap();

        let names: Vec<&str> = collector
            .get_all_metrics()
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
        assert_eq!(collector.total_values(), 3);

        assert!(collector.remove_metric("a").is_some());
        assert_eq!(collector.metric_names(), vec!["b".to_string(), "c".to_string()]);

        collector.clear();
        assert_eq!(collector.get_metrics_count(), 0);
        assert!(collector.get_all_metrics().is_empty());
    }
}
